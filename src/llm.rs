use crate::error::{Error, Result};
use log::warn;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Hard timeout for one provider round-trip.
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Deterministic heuristics. Default in dev, and the fallback target
    /// whenever the HTTP provider fails.
    Stub,
    /// OpenAI-compatible chat-completions endpoint.
    Http,
}

struct HttpProvider {
    // Built on first use: route handlers run on blocking-permitted threads,
    // the server launch path does not.
    client: OnceLock<reqwest::blocking::Client>,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpProvider {
    fn client(&self) -> &reqwest::blocking::Client {
        self.client.get_or_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(LLM_TIMEOUT)
                .build()
                .expect("Failed to create LLM HTTP client")
        })
    }
}

/// Process-wide gateway. Per-turn, `capability()` resolves the tenant's
/// provider choice into an `Llm` handle threaded through the request context.
pub struct LlmGateway {
    http: Option<HttpProvider>,
    default_kind: ProviderKind,
}

impl LlmGateway {
    pub fn from_env() -> Self {
        let base_url = env::var("LLM_BASE_URL").ok();
        let api_key = env::var("LLM_API_KEY").ok();
        let http = match (base_url, api_key) {
            (Some(base_url), Some(api_key)) => Some(HttpProvider {
                client: OnceLock::new(),
                base_url,
                api_key,
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            }),
            _ => None,
        };

        let default_kind = match env::var("LLM_PROVIDER").as_deref() {
            Ok("http") if http.is_some() => ProviderKind::Http,
            _ => ProviderKind::Stub,
        };

        LlmGateway { http, default_kind }
    }

    /// Resolve the effective provider for a tenant (`llm-provider` config
    /// section overrides the process default).
    pub fn capability(&self, tenant_cfg: Option<&serde_json::Value>) -> Llm<'_> {
        let kind = tenant_cfg
            .and_then(|v| v.get("provider"))
            .and_then(|v| v.as_str())
            .and_then(|s| match s {
                "http" if self.http.is_some() => Some(ProviderKind::Http),
                "stub" => Some(ProviderKind::Stub),
                _ => None,
            })
            .unwrap_or(self.default_kind);
        Llm { gateway: self, kind }
    }
}

/// The per-turn LLM capability: `complete` for prose, `structured` for JSON.
pub struct Llm<'a> {
    gateway: &'a LlmGateway,
    kind: ProviderKind,
}

impl Llm<'_> {
    /// Free-text completion. One retry on transient failure.
    pub fn complete(&self, prompt: &str) -> Result<String> {
        match self.kind {
            ProviderKind::Stub => Ok(stub_complete(prompt)),
            ProviderKind::Http => {
                let provider = self.http()?;
                match http_complete(provider, prompt) {
                    Ok(text) => Ok(text),
                    Err(first) => {
                        warn!("LLM complete failed, retrying once: {first}");
                        http_complete(provider, prompt)
                    }
                }
            }
        }
    }

    /// Structured completion: the provider must return a single JSON object.
    /// Malformed output gets one retry, then an error for the caller's
    /// fallback path.
    pub fn structured(&self, prompt: &str) -> Result<serde_json::Value> {
        match self.kind {
            ProviderKind::Stub => stub_structured(prompt),
            ProviderKind::Http => {
                let provider = self.http()?;
                match http_structured(provider, prompt) {
                    Ok(value) => Ok(value),
                    Err(first) => {
                        warn!("LLM structured call failed, retrying once: {first}");
                        http_structured(provider, prompt)
                    }
                }
            }
        }
    }

    fn http(&self) -> Result<&HttpProvider> {
        self.gateway
            .http
            .as_ref()
            .ok_or_else(|| Error::Provider("HTTP provider not configured".to_string()))
    }
}

fn http_complete(provider: &HttpProvider, prompt: &str) -> Result<String> {
    let body = serde_json::json!({
        "model": provider.model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.4,
    });
    let resp = provider
        .client()
        .post(format!("{}/chat/completions", provider.base_url))
        .bearer_auth(&provider.api_key)
        .json(&body)
        .send()
        .map_err(|e| Error::Provider(e.to_string()))?;
    let value: serde_json::Value = resp.json().map_err(|e| Error::Provider(e.to_string()))?;
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Provider("missing completion content".to_string()))
}

fn http_structured(provider: &HttpProvider, prompt: &str) -> Result<serde_json::Value> {
    let body = serde_json::json!({
        "model": provider.model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.0,
        "response_format": {"type": "json_object"},
    });
    let resp = provider
        .client()
        .post(format!("{}/chat/completions", provider.base_url))
        .bearer_auth(&provider.api_key)
        .json(&body)
        .send()
        .map_err(|e| Error::Provider(e.to_string()))?;
    let value: serde_json::Value = resp.json().map_err(|e| Error::Provider(e.to_string()))?;
    let content = value["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| Error::Provider("missing completion content".to_string()))?;
    serde_json::from_str(content).map_err(|e| Error::Provider(format!("malformed JSON: {e}")))
}

// --- Stub provider ---
//
// Prompts carry well-known markers (see detect::unified_prompt and
// compose::tone_prompt) so the stub can answer deterministically without
// any network access.

/// Tone rewrites are a no-op in the stub: return the text to rewrite
/// verbatim, which trivially preserves every hard fact.
fn stub_complete(prompt: &str) -> String {
    match prompt.split("### TEXT TO REWRITE\n").nth(1) {
        Some(text) => text.trim().to_string(),
        None => prompt.trim().to_string(),
    }
}

/// Unified detection via the same heuristics that back legacy mode.
fn stub_structured(prompt: &str) -> Result<serde_json::Value> {
    let today = prompt
        .split("### TODAY: ")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .and_then(crate::dates::parse_iso)
        .unwrap_or_else(crate::dates::today);
    let body = prompt
        .split("### MESSAGE\n")
        .nth(1)
        .ok_or_else(|| Error::Provider("stub: prompt missing message marker".to_string()))?;
    let result = crate::detect::heuristic_unified(body, today);
    Ok(serde_json::to_value(result)?)
}
