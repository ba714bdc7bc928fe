//! Bot API JSON fixtures deserialized into teloxide updates

use serde_json::{Value, json};
use teloxide::types::Update;

pub fn private_chat(id: i64) -> Value {
    json!({ "id": id, "type": "private", "first_name": "Test" })
}

pub fn group_chat(id: i64, title: &str) -> Value {
    json!({ "id": id, "type": "supergroup", "title": title })
}

pub fn message_update(user_id: i64, chat: Value, text: &str) -> Update {
    let raw = json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 1_735_992_000,
            "chat": chat,
            "from": { "id": user_id, "is_bot": false, "first_name": "Test" },
            "text": text,
        }
    });
    serde_json::from_str(&raw.to_string()).expect("valid update json")
}
