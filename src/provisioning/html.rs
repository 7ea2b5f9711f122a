//! Provisioning pages.

use super::form::{PASSWORD_FIELD, SSID_FIELD};

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>AQI Monitor Setup</title>
<style>
body { font-family: sans-serif; max-width: 24em; margin: 2em auto; padding: 0 1em; }
label, input { display: block; width: 100%; box-sizing: border-box; }
input { margin: 0.3em 0 1em; padding: 0.5em; }
.error { color: #b00020; }
</style>
</head>
<body>
"#;

const TAIL: &str = "</body>\n</html>\n";

/// Escape text for use in element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Credentials form. `error` is shown above the fields and `ssid` pre-fills
/// the network name after a rejected submission.
pub fn form_page(error: Option<&str>, ssid: &str) -> String {
    let error_html = error
        .map(|e| format!("<p class=\"error\">{}</p>\n", escape_html(e)))
        .unwrap_or_default();

    format!(
        r#"{head}<h1>Enter Wi-Fi Credentials</h1>
{error_html}<form method="POST" action="/">
<label for="{ssid_field}">Network name (SSID)</label>
<input type="text" id="{ssid_field}" name="{ssid_field}" value="{ssid}" required>
<label for="{password_field}">Password</label>
<input type="password" id="{password_field}" name="{password_field}" required>
<input type="submit" value="Save">
</form>
{tail}"#,
        head = HEAD,
        error_html = error_html,
        ssid_field = SSID_FIELD,
        password_field = PASSWORD_FIELD,
        ssid = escape_html(ssid),
        tail = TAIL,
    )
}

/// Confirmation after valid credentials were accepted.
pub fn received_page(ssid: &str) -> String {
    format!(
        "{}<h1>Credentials Received</h1>\n<p>The device will save the settings for <b>{}</b> \
         and restart. Reconnect to your usual network.</p>\n{}",
        HEAD,
        escape_html(ssid),
        TAIL
    )
}

/// Shown to requests that arrive after a submission was accepted.
pub fn restarting_page() -> String {
    format!(
        "{}<h1>Restarting</h1>\n<p>Settings already received.</p>\n{}",
        HEAD, TAIL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_has_contract_fields() {
        let page = form_page(None, "");
        assert!(page.contains(r#"name="ssid""#));
        assert!(page.contains(r#"name="password""#));
        assert!(page.contains(r#"method="POST""#));
        assert!(!page.contains("class=\"error\""));
    }

    #[test]
    fn test_form_with_error_keeps_ssid() {
        let page = form_page(Some("password cannot be empty"), "HomeNet");
        assert!(page.contains("password cannot be empty"));
        assert!(page.contains(r#"value="HomeNet""#));
    }

    #[test]
    fn test_values_are_escaped() {
        let page = form_page(Some("<b>"), "\"><script>");
        assert!(page.contains("&lt;b&gt;"));
        assert!(page.contains("&quot;&gt;&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn test_received_page_names_network() {
        assert!(received_page("Home & Garden").contains("Home &amp; Garden"));
    }
}
