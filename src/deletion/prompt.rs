use crate::catalog::{Record, RecordKind, Stored};
use crate::utils::safe_truncate_ellipsis;


const MAX_LABEL_CHARS: usize = 60;


pub fn confirmation_prompt<R: Record>(record: &Stored<R>) -> String {
    format!("Delete {} \"{}\"?", R::KIND.noun(), short_label(&record.label()))
}


pub fn deleted_message(kind: RecordKind, label: &str) -> String {
    format!("{} \"{}\" deleted.", capitalized(kind), short_label(label))
}


pub fn restored_message(kind: RecordKind, label: &str) -> String {
    format!("{} \"{}\" restored.", capitalized(kind), short_label(label))
}


pub fn remove_failed_message(kind: RecordKind, label: &str) -> String {
    format!(
        "Failed to delete {} \"{}\". Please try again.",
        kind.noun(),
        short_label(label)
    )
}


pub fn restore_failed_message(kind: RecordKind, label: &str, reason: &str) -> String {
    format!(
        "Failed to restore {} \"{}\": {}",
        kind.noun(),
        short_label(label),
        reason
    )
}

fn short_label(label: &str) -> String {
    safe_truncate_ellipsis(label.trim(), MAX_LABEL_CHARS)
}

fn capitalized(kind: RecordKind) -> String {
    let noun = kind.noun();
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
