use crate::models::Locale;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

// Countries whose visitors get the Russian locale by default.
const POST_SOVIET_COUNTRIES: [&str; 12] = [
    "RU", "BY", "KZ", "KG", "TJ", "TM", "UZ", "AM", "AZ", "GE", "MD", "UA",
];

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Best-effort `{country} -> locale` mapping used by the language picker.
pub fn country_to_locale(country: &str) -> Locale {
    if POST_SOVIET_COUNTRIES.contains(&country) {
        Locale::Ru
    } else {
        Locale::En
    }
}

// GET /api/geo: best-effort country lookup for locale detection. Never
// fails the caller: anything that goes wrong degrades to "US".
pub async fn geo_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Value> {
    // a fronting proxy may already know the country
    for name in ["x-vercel-ip-country", "cf-ipcountry", "x-country-code"] {
        if let Some(country) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !country.is_empty() {
                return Json(json!({ "country": country.to_uppercase() }));
            }
        }
    }

    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "127.0.0.1".to_string());

    // local development has no usable address; the site is Russian-first
    if ip == "127.0.0.1" || ip == "::1" {
        return Json(json!({ "country": "RU" }));
    }

    match lookup_country(&state.http, &ip).await {
        Some(country) => Json(json!({ "country": country })),
        None => Json(json!({ "country": "US" })),
    }
}

async fn lookup_country(client: &reqwest::Client, ip: &str) -> Option<String> {
    let response = client
        .get(format!("https://ipapi.co/{}/country_code/", ip))
        .header("User-Agent", "terteryan-website/1.0")
        .timeout(LOOKUP_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    let code = response.text().await.ok()?;
    let code = code.trim();
    if code.len() == 2 {
        Some(code.to_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_soviet_countries_map_to_russian() {
        for country in ["RU", "BY", "AM", "UA", "KZ"] {
            assert_eq!(country_to_locale(country), Locale::Ru, "{}", country);
        }
        for country in ["US", "DE", "FR", "JP", ""] {
            assert_eq!(country_to_locale(country), Locale::En, "{}", country);
        }
    }
}
