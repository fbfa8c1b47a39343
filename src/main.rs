use anyhow::Context;
use mailstate::{Config, FolderId, LocalMailbox, MailEngine, MoveRequest};
use std::sync::Arc;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .cloned()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        format!("{:width$}", text, width = width)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let args: Vec<String> = std::env::args().collect();
    let debug_logging = args.iter().any(|arg| arg == "--debug");

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level(debug_logging))
        .with_writer(std::io::stderr)
        .init();

    let snapshot_path =
        arg_value(&args, "--snapshot").unwrap_or_else(|| "demo/snapshot.json".to_string());
    let mailbox_id = config.mailbox_id.clone();
    let api = LocalMailbox::from_json_file(&mailbox_id, &snapshot_path).await?;
    let engine = MailEngine::new(Arc::new(api), config);
    engine.load_mailbox(&mailbox_id).await?;

    if let Some(move_arg) = arg_value(&args, "--move") {
        let (message_id, folder) = move_arg
            .split_once(':')
            .context("--move expects MESSAGE_ID:FOLDER")?;
        match engine
            .move_message_remote(MoveRequest::new(&mailbox_id, message_id, folder))
            .await
        {
            Ok(Some(payload)) => println!(
                "Moved {} from {} to {}",
                payload.message_id,
                payload.previous_folder_id.as_deref().unwrap_or("?"),
                payload.current_folder_id.as_deref().unwrap_or("?")
            ),
            Ok(None) => println!("Move of {} skipped", message_id),
            Err(e) => eprintln!("Move of {} failed: {}", message_id, e),
        }
    }

    if let Some(folder) = arg_value(&args, "--folder") {
        engine.select_mailbox(&folder);
    }
    if let Some(query) = arg_value(&args, "--search") {
        engine.set_search(&query);
    }

    let visible = engine.filtered();
    println!("{} ({} shown)", engine.active_folder(), visible.len());
    for message in &visible {
        let marker = if message.read { " " } else { "*" };
        println!(
            "{} {} {} {}",
            marker,
            truncate(&message.id, 12),
            truncate(&message.from, 24),
            message.subject
        );
    }

    let counters = engine.counters();
    let summary: Vec<String> = FolderId::ALL
        .iter()
        .map(|folder| {
            format!(
                "{}: {} ({} unread)",
                folder.display_name(),
                counters.get(*folder),
                counters.unread(*folder)
            )
        })
        .collect();
    println!("{}", summary.join(" | "));

    Ok(())
}
