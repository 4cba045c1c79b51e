use super::*;
use crate::params::RequestParams;

const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog xmlns:m="urn:media">
  <book id="1" lang="en"><title>Dune</title><price>9.50</price></book>
  <book id="2" lang="fr"><title>Vol de nuit</title><price>7</price></book>
  <m:disc id="3"><m:title>Kind of Blue</m:title></m:disc>
</catalog>"#;

fn xpath_values(text: &str, expr: &str) -> Vec<String> {
    let dom = Dom::parse_xml(text).unwrap();
    XPath::compile(expr).unwrap().values(&dom).unwrap()
}

fn run(text: &str, html: bool, pairs: &[&str], expressions: &[&str]) -> Result<ColumnValueSet, ParseError> {
    let params = RequestParams::from_pairs(pairs.iter().copied());
    let ctx = ParseContext::new(&params, expressions.iter().map(|e| e.to_string()).collect());
    parse(text, html, &ctx, false)
}

#[test]
fn raw_mode_flattens_leaves_and_attributes() {
    let values = run(CATALOG, false, &[], &[]).unwrap();
    assert_eq!(values.get("id").unwrap(), &vec!["1", "2", "3"]);
    assert_eq!(values.get("title").unwrap(), &vec!["Dune", "Vol de nuit", "Kind of Blue"]);
    assert_eq!(values.get("price").unwrap(), &vec!["9.50", "7"]);
    assert!(!values.contains("m"));
}

#[test]
fn xpath_paths_and_predicates() {
    assert_eq!(xpath_values(CATALOG, "/catalog/book/title"), vec!["Dune", "Vol de nuit"]);
    assert_eq!(xpath_values(CATALOG, "//book[@lang='fr']/title"), vec!["Vol de nuit"]);
    assert_eq!(xpath_values(CATALOG, "//book[2]/@id"), vec!["2"]);
    assert_eq!(xpath_values(CATALOG, "//book[last()]/price"), vec!["7"]);
    assert_eq!(xpath_values(CATALOG, "//book[price > 8]/title"), vec!["Dune"]);
    assert_eq!(xpath_values(CATALOG, "count(//book)"), vec!["2"]);
    assert_eq!(
        xpath_values(CATALOG, "//title[contains(., 'un')]/../@id"),
        vec!["1"]
    );
}

#[test]
fn xpath_namespaces_resolve_from_document() {
    assert_eq!(xpath_values(CATALOG, "//m:disc/m:title"), vec!["Kind of Blue"]);
    // Unprefixed tests match on local name.
    assert_eq!(xpath_values(CATALOG, "//disc/@id"), vec!["3"]);
}

#[test]
fn xpath_mode_keys_columns_by_expression() {
    let values = run(CATALOG, false, &["use xpath"], &["//book/title", "//book/@lang"]).unwrap();
    assert_eq!(values.get("//book/title").unwrap(), &vec!["Dune", "Vol de nuit"]);
    assert_eq!(values.get("//book/@lang").unwrap(), &vec!["en", "fr"]);
}

#[test]
fn xpath_syntax_errors_surface() {
    let err = run(CATALOG, false, &["use xpath"], &["//book["]).unwrap_err();
    assert!(matches!(err, ParseError::XPath(_)));
}

#[test]
fn malformed_xml_is_rejected() {
    assert!(run("<a><b></a>", false, &[], &[]).is_err());
    assert!(run("<a><b>", false, &[], &[]).is_err());
}

#[test]
fn html_is_parsed_leniently() {
    let page = r#"<!DOCTYPE html>
<html><body>
  <div class="item main"><a href="/one">One</a><br></div>
  <div class="item"><a href="/two">Two &amp; more</a>
  <p>unclosed
</body></html>"#;
    let values = run(page, true, &["use css"], &["div.item > a", "div.item a.attr(href)", ".main a"]).unwrap();
    assert_eq!(values.get("div.item > a").unwrap(), &vec!["One", "Two & more"]);
    assert_eq!(values.get("div.item a.attr(href)").unwrap(), &vec!["/one", "/two"]);
    assert_eq!(values.get(".main a").unwrap(), &vec!["One"]);
}

#[test]
fn script_content_is_kept_as_text() {
    let page = "<html><body><script>var ok = a && b;</script><p>ok</p></body></html>";
    let dom = Dom::parse_html(page).unwrap();
    let script = find_element(&dom, "script").unwrap();
    assert!(dom.text_content(script).contains("a && b"));
    assert_eq!(xpath_values_html(page, "//p"), vec!["ok"]);
}

fn xpath_values_html(text: &str, expr: &str) -> Vec<String> {
    let dom = Dom::parse_html(text).unwrap();
    XPath::compile(expr).unwrap().values(&dom).unwrap()
}

#[test]
fn css_translation() {
    assert_eq!(css::css_to_xpath("ul > li").unwrap(), "//ul/li");
    assert_eq!(css::css_to_xpath("#main").unwrap(), "//*[@id='main']");
    assert_eq!(css::css_to_xpath("a[href^=http]").unwrap(), "//a[starts-with(@href, 'http')]");
    assert_eq!(css::css_to_xpath("li:first-child").unwrap(), "//li[not(preceding-sibling::*)]");
    assert_eq!(css::css_to_xpath("h1, h2").unwrap(), "//h1 | //h2");
    assert_eq!(css::css_to_xpath("img.attr(src)").unwrap(), "//img/@src");
    assert!(css::css_to_xpath("a:hover").is_err());
}

#[test]
fn css_attribute_operators_select_nodes() {
    let page = r#"<html><body>
<a href="https://x.org/a.pdf" rel="nofollow external">1</a>
<a href="/b.html" lang="en-US">2</a>
</body></html>"#;
    let sel = |css: &str| xpath_values_html(page, &css::css_to_xpath(css).unwrap());
    assert_eq!(sel("a[href$=.pdf]"), vec!["1"]);
    assert_eq!(sel("a[href*=b.ht]"), vec!["2"]);
    assert_eq!(sel("a[rel~=external]"), vec!["1"]);
    assert_eq!(sel("a[lang|=en]"), vec!["2"]);
    assert_eq!(sel("a[lang]"), vec!["2"]);
}

#[test]
fn entities_are_unescaped() {
    assert_eq!(dom::unescape("a &lt;b&gt; &#65;&#x42; &bogus; &"), "a <b> AB &bogus; &");
}

#[test]
fn auto_requires_markup() {
    let params = RequestParams::new();
    let ctx = ParseContext::new(&params, Vec::new());
    assert!(parse("a,b\n1,2", false, &ctx, true).is_err());
    assert!(parse("<root/>", true, &ctx, true).is_err());
    assert!(parse("<root><v>1</v></root>", false, &ctx, true).unwrap().has_data());
}
