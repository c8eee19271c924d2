use hmac::{Hmac, Mac};
use log::{info, warn};
use sha2::Sha256;
use std::env;
use tokio::sync::broadcast;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, serde::Serialize)]
pub struct OutboundMail {
    pub tenant_id: String,
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

/// Outbound mail bus. Route handlers publish; the background dispatcher
/// delivers to the configured relay, or logs in simulation mode.
pub struct Outbox {
    pub sender: broadcast::Sender<OutboundMail>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Outbox { sender }
    }

    pub fn publish(&self, mail: OutboundMail) {
        // Ignore send errors (no subscribers in tests)
        let _ = self.sender.send(mail);
    }
}

/// Spawns the background delivery task. Without `MAIL_RELAY_URL` the
/// dispatcher runs in simulation mode and only logs deliveries.
pub fn spawn_dispatcher(mut receiver: broadcast::Receiver<OutboundMail>) {
    tokio::spawn(async move {
        let relay_url = env::var("MAIL_RELAY_URL").ok();
        let secret = env::var("MAIL_RELAY_SECRET").ok();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create mail relay client");

        loop {
            match receiver.recv().await {
                Ok(mail) => {
                    let Some(url) = relay_url.as_deref() else {
                        info!(
                            "mail simulation: to={} subject={:?} ({} chars)",
                            mail.to,
                            mail.subject,
                            mail.body_text.len()
                        );
                        continue;
                    };
                    deliver(&client, url, secret.as_deref(), mail).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("mail dispatcher lagged, missed {n} messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("mail dispatcher: channel closed, exiting");
                    break;
                }
            }
        }
    });
}

async fn deliver(client: &reqwest::Client, url: &str, secret: Option<&str>, mail: OutboundMail) {
    let body = serde_json::to_string(&mail).unwrap_or_default();

    let mut request = client
        .post(url)
        .header("Content-Type", "application/json");

    // HMAC-SHA256 signature if a relay secret is configured
    if let Some(secret) = secret
        && let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes())
    {
        mac.update(body.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        request = request.header("X-Venue-Signature", format!("sha256={signature}"));
    }

    let request = request.body(body);
    tokio::spawn(async move {
        match request.send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("mail relay delivery failed: HTTP {}", resp.status());
                }
            }
            Err(e) => {
                warn!("mail relay delivery error: {e}");
            }
        }
    });
}
