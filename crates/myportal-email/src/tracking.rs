// SPDX-FileCopyrightText: 2026 MyPortal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Open/click tracking instrumentation for outbound HTML email.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::Regex;
use url::Url;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href\s*=\s*"(https?://[^"]+)""#).unwrap_or_else(|e| panic!("href regex: {e}"))
});

/// Generate a URL-safe tracking id with 32 bytes of entropy.
pub fn new_tracking_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Inject a 1x1 tracking pixel into an HTML body.
///
/// Placed immediately before `</body>` when present, appended otherwise.
pub fn inject_pixel(html: &str, pixel_url: &str) -> String {
    let pixel = format!(r#"<img src="{pixel_url}" width="1" height="1" alt="" style="display:none">"#);
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + pixel.len());
            out.push_str(&html[..pos]);
            out.push_str(&pixel);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{pixel}"),
    }
}

/// Rewrite `http(s)` href targets through the portal click endpoint.
///
/// Links already pointing at the portal origin are left alone so tracked
/// links and tracking infrastructure never nest.
pub fn rewrite_links(html: &str, portal_base: &str, tracking_id: &str) -> String {
    let portal_host = Url::parse(portal_base).ok().and_then(|u| {
        u.host_str().map(|h| (h.to_string(), u.port()))
    });

    HREF_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let target = &caps[1];
            let is_portal = portal_host.as_ref().is_some_and(|(host, port)| {
                Url::parse(target)
                    .ok()
                    .is_some_and(|u| u.host_str() == Some(host.as_str()) && u.port() == *port)
            });
            if is_portal {
                return caps[0].to_string();
            }
            let encoded: String =
                url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
            format!(
                r#"href="{}/t/click?tid={tracking_id}&url={encoded}""#,
                portal_base.trim_end_matches('/')
            )
        })
        .into_owned()
}
