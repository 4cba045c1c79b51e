//! URL pieces used for config scoping and throttle keys.

use reqwest::Url;

/// Lower-cased host of `url`, if it parses and has one.
pub fn host(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed.host_str().map(str::to_lowercase)
}

/// Last two labels of a host name (`www.example.org` -> `example.org`).
/// IP addresses are returned unchanged.
pub fn second_level_domain(host: &str) -> String {
    if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        return host.to_string();
    }
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_and_domain() {
        assert_eq!(host("https://API.Example.org:8443/x?y=1").as_deref(), Some("api.example.org"));
        assert_eq!(host("not a url"), None);
        assert_eq!(second_level_domain("a.b.example.org"), "example.org");
        assert_eq!(second_level_domain("localhost"), "localhost");
        assert_eq!(second_level_domain("10.0.0.1"), "10.0.0.1");
    }
}
