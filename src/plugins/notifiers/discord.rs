use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::plugins::traits::{Notification, NotificationKind, NotifierPlugin};
use crate::utils::error::AppError;

const COLOR_GREEN: u32 = 3066993;
const COLOR_RED: u32 = 15158332;

/// Posts notifications to Discord webhooks.
pub struct DiscordNotifier {
    client: Client,
    username: Option<String>,
}

impl DiscordNotifier {
    pub fn new(username: Option<String>) -> crate::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self { client, username })
    }

    fn get_embed_color(&self, notification: &Notification) -> u32 {
        match notification.kind {
            NotificationKind::Restock => COLOR_GREEN,
            NotificationKind::PriceChange => match notification.delta() {
                Some(delta) if delta < 0 => COLOR_GREEN,
                _ => COLOR_RED,
            },
            NotificationKind::SoldOut | NotificationKind::Info => COLOR_RED,
        }
    }

    fn create_embed(&self, notification: &Notification) -> Option<serde_json::Value> {
        let adapter = &notification.adapter;
        let timestamp_field = json!({ "name": "시간(KST)", "value": notification.timestamp, "inline": false });

        match notification.kind {
            NotificationKind::Restock => Some(json!({
                "title": format!("{} 재입고 감지", adapter),
                "description": notification.url,
                "color": self.get_embed_color(notification),
                "fields": [
                    { "name": "상태", "value": "품절 -> 재입고", "inline": true },
                    { "name": "현재 가격", "value": format_won(notification.current), "inline": true },
                    timestamp_field,
                ]
            })),
            NotificationKind::PriceChange => {
                let change = match notification.delta() {
                    Some(delta) if delta > 0 => format!("+{}원", group_thousands(delta.unsigned_abs())),
                    Some(delta) if delta < 0 => format!("-{}원", group_thousands(delta.unsigned_abs())),
                    Some(_) => "0원".to_string(),
                    None => "N/A".to_string(),
                };
                Some(json!({
                    "title": format!("{} 가격 변동 감지", adapter),
                    "description": notification.url,
                    "color": self.get_embed_color(notification),
                    "fields": [
                        { "name": "이전", "value": format_won(notification.previous), "inline": true },
                        { "name": "현재", "value": format_won(notification.current), "inline": true },
                        { "name": "변동", "value": change, "inline": true },
                        timestamp_field,
                    ]
                }))
            }
            NotificationKind::SoldOut | NotificationKind::Info => None,
        }
    }

    fn create_webhook_payload(&self, notification: &Notification) -> serde_json::Value {
        let content = match notification.kind {
            NotificationKind::Restock => "재입고 알림".to_string(),
            NotificationKind::PriceChange => "가격 변동 알림".to_string(),
            NotificationKind::SoldOut => format!(
                "[{}] 품절 감지: {}\n매입가격 칸에 [품절] 기록",
                notification.adapter, notification.url
            ),
            NotificationKind::Info => notification.message.clone().unwrap_or_default(),
        };

        let mut payload = json!({ "content": content });
        if let Some(embed) = self.create_embed(notification) {
            payload["embeds"] = json!([embed]);
        }
        if let Some(username) = &self.username {
            payload["username"] = json!(username);
        }
        payload
    }
}

fn group_thousands(amount: u128) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn format_won(amount: Option<u64>) -> String {
    match amount {
        Some(amount) => format!("{}원", group_thousands(amount as u128)),
        None => "N/A".to_string(),
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, channel: &str, notification: &Notification) -> crate::Result<()> {
        if channel.trim().is_empty() {
            tracing::info!("No webhook configured, notification logged only: {:?}", notification.kind);
            return Ok(());
        }

        let payload = self.create_webhook_payload(notification);
        let response = self.client.post(channel).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!("Discord webhook returned {}: {}", status, body)));
        }

        Ok(())
    }
}
