//! Output formatting and input helpers for the `taskdeck` binary.

use anyhow::{Context as _, Result};
use std::io::{BufRead, Write};

use crate::task::Task;

/// Print the task collection as a formatted table.
pub fn print_task_table(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    println!("{:<36} {:<12} TITLE", "ID", "STATUS");
    println!("{}", "-".repeat(72));
    for t in tasks {
        println!("{:<36} {:<12} {}", t.id, t.status, t.title);
    }
    println!("\n{} task(s)", tasks.len());
}

/// Print the full detail of one task.
pub fn print_task_detail(task: &Task) {
    println!("ID:          {}", task.id);
    println!("Title:       {}", task.title);
    println!("Status:      {}", task.status);
    println!(
        "Description: {}",
        task.description.as_deref().unwrap_or("-")
    );
    println!("Created:     {}", task.created_at.to_rfc3339());
    if let Some(updated) = task.updated_at {
        println!("Updated:     {}", updated.to_rfc3339());
    }
}

/// Resolve the password: the `--password` flag if given, otherwise one line
/// read from stdin (prompted on stderr so stdout stays pipeable).
pub fn resolve_password(flag: Option<String>) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p);
    }
    eprint!("Password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
