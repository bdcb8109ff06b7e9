//! Minimal HTML assembly for notification bodies.

use crate::model::DeviceInfo;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn with_prefix(prefix: Option<&str>, subject: String) -> String {
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("{p} {subject}"),
        None => subject,
    }
}

/// `branch/flavor (build)` for each device, comma separated.
pub fn describe_devices(devices: &[DeviceInfo]) -> String {
    if devices.is_empty() {
        return "unknown devices".to_string();
    }
    devices
        .iter()
        .map(|d| {
            if d.build_id.is_empty() {
                format!("{}/{}", d.branch, d.build_flavor)
            } else {
                format!("{}/{} ({})", d.branch, d.build_flavor, d.build_id)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn test_link(base_url: &str, test_name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(test_name.as_bytes()).collect();
    format!("{}/show_table?testName={encoded}", base_url.trim_end_matches('/'))
}

/// Accumulates body fragments; text arguments are escaped.
#[derive(Debug, Default)]
pub struct HtmlBody {
    buf: String,
}

impl HtmlBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&format!("<h2>{}</h2>\n", escape(text)));
        self
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        self.buf.push_str(&format!("<p>{}</p>\n", escape(text)));
        self
    }

    pub fn list(&mut self, title: &str, items: &[String]) -> &mut Self {
        self.buf.push_str(&format!("<h3>{}</h3>\n<ul>\n", escape(title)));
        for item in items {
            self.buf.push_str(&format!("<li>{}</li>\n", escape(item)));
        }
        self.buf.push_str("</ul>\n");
        self
    }

    pub fn link(&mut self, href: &str, text: &str) -> &mut Self {
        self.buf.push_str(&format!(
            "<p><a href=\"{}\">{}</a></p>\n",
            escape(href),
            escape(text)
        ));
        self
    }

    /// Appends pre-rendered markup as is.
    pub fn raw(&mut self, markup: &str) -> &mut Self {
        self.buf.push_str(markup);
        self
    }

    pub fn finish(&self) -> String {
        format!("<html><body>\n{}</body></html>\n", self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn blank_prefix_is_ignored() {
        assert_eq!(with_prefix(Some("  "), "s".into()), "s");
        assert_eq!(with_prefix(Some("[VTS]"), "s".into()), "[VTS] s");
    }

    #[test]
    fn link_trims_trailing_slash() {
        assert_eq!(
            test_link("https://d.example.com/", "Vts Hal"),
            "https://d.example.com/show_table?testName=Vts+Hal"
        );
    }
}
