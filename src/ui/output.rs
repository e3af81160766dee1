use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn document_new(key: &str, chunks: usize) {
    println!(
        "{} {} {}",
        Icons::NEW.style(theme().success.clone()),
        key,
        muted(&format!("({} chunks)", chunks))
    );
}

pub fn document_modified(key: &str, chunks: usize) {
    println!(
        "{} {} {}",
        Icons::MOD.style(theme().warn.clone()),
        key,
        muted(&format!("({} chunks)", chunks))
    );
}

pub fn document_removed(key: &str) {
    println!("{} {}", Icons::DEL.style(theme().error.clone()), key);
}

pub fn document_unchanged(key: &str) {
    println!("  {}", key.style(theme().muted.clone()));
}

pub fn document_skipped(key: &str) {
    println!(
        "{} {} {}",
        Icons::SKIP.style(theme().dim.clone()),
        key.style(theme().muted.clone()),
        dim("(unsupported type)")
    );
}

pub fn document_failed(key: &str, reason: &str) {
    eprintln!(
        "{} {}: {}",
        Icons::CROSS.style(theme().error.clone()),
        key,
        reason.style(theme().error.clone())
    );
}

pub fn answer(text: &str) {
    println!();
    println!("{} {}", Icons::ROBOT, text.style(theme().answer.clone()));
}

pub fn source(key: &str, score: f32) {
    println!(
        "  {} {} {}",
        Icons::FILE.style(theme().info.clone()),
        key,
        muted(&format!("(relevance {:.2})", score))
    );
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
