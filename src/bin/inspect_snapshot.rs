use mailstate::filter::matches_search;
use mailstate::folder::build_effective_folder_map;
use mailstate::models::MailboxSnapshot;
use mailstate::wire::normalize_messages;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <search_query> [snapshot.json]", args[0]);
        eprintln!("Search query matches against Sender, Subject or Preview.");
        std::process::exit(1);
    }

    let query = &args[1];
    let path = args.get(2).map(String::as_str).unwrap_or("demo/snapshot.json");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read snapshot {}: {}", path, e))?;
    let snapshot: MailboxSnapshot = serde_json::from_str(&content)?;

    let messages = normalize_messages(snapshot.messages.unwrap_or_default());
    let folders = build_effective_folder_map(snapshot.effective_folders.as_ref(), &messages);

    if let Some(message) = messages.iter().find(|m| matches_search(m, query)) {
        let folder = folders.get(&message.id).copied().unwrap_or_default();
        println!("ID: {}", message.id);
        println!("From: {} <{}>", message.from, message.from_email);
        println!("Subject: {}", message.subject);
        println!("Date: {} ({})", message.timestamp, message.timestamp_iso);
        println!("Folder: {}", folder.display_name());
        let labels: Vec<&str> = message.labels.iter().map(String::as_str).collect();
        println!("Labels: {}", labels.join(", "));
        println!("--- Text ---\n{}", message.content_text);
        match &message.content_html {
            Some(html) => println!("--- HTML ({} bytes) ---", html.len()),
            None => println!("--- No HTML body ---"),
        }
    } else {
        println!("No message found matching '{}'", query);
    }

    Ok(())
}
