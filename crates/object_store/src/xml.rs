//! Asset enumeration and `xlink:href` rewriting over SciELO PS XML.
//!
//! `roxmltree` is read-only by design, so rewriting an asset reference does
//! not walk a mutable tree: it locates the byte span of the attribute value
//! inside the original text (via [`roxmltree::Node::range`]) and splices a
//! replacement string in, the same way a line-oriented patch tool would.
//! This keeps every other byte of the document — including comments, blank
//! text and attribute ordering — untouched.

use std::ops::Range;

use errors::KernelError;

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

const ASSET_TAGS: [&str; 5] =
    ["graphic", "media", "inline-graphic", "supplementary-material", "inline-supplementary-material"];

/// An XML document retained as text alongside its parse, so asset rewriting
/// can splice byte ranges of the original source rather than re-serializing
/// a tree.
pub struct ParsedXml {
    text: String,
}

impl ParsedXml {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }
}

/// One `xlink:href`-carrying element discovered while enumerating assets,
/// identified by the href value itself (the asset's id in this domain) and
/// the byte range of its owning element in the source text.
#[derive(Debug, Clone)]
pub struct AssetRef {
    pub asset_id: String,
    element_range: Range<usize>,
}

/// Parses `text` and returns it alongside every asset reference found in
/// document order, scanning `graphic`, `media`, `inline-graphic`,
/// `supplementary-material` and `inline-supplementary-material` elements
/// carrying `xlink:href`.
pub fn enumerate_assets(text: String) -> Result<(ParsedXml, Vec<AssetRef>), KernelError> {
    let doc = roxmltree::Document::parse(&text)
        .map_err(|err| KernelError::Terminal(format!("invalid XML: {err}")))?;

    let mut refs = Vec::new();
    for node in doc.descendants() {
        if !node.is_element() || !ASSET_TAGS.contains(&node.tag_name().name()) {
            continue;
        }
        if let Some(href) = node.attribute((XLINK_NS, "href")) {
            refs.push(AssetRef { asset_id: href.to_string(), element_range: node.range() });
        }
    }

    Ok((ParsedXml { text }, refs))
}

/// Rewrites every asset reference's `xlink:href` value to whatever
/// `resolve` returns for its asset id (the empty string for unknown ids),
/// returning a brand new XML text byte-for-byte identical to the original
/// outside the rewritten attribute values.
pub fn rewrite_hrefs(xml: &ParsedXml, refs: &[AssetRef], mut resolve: impl FnMut(&str) -> String) -> Vec<u8> {
    let mut spans: Vec<(Range<usize>, String)> = refs
        .iter()
        .filter_map(|r| find_href_value_span(&xml.text, &r.element_range).map(|span| (span, resolve(&r.asset_id))))
        .collect();
    spans.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(xml.text.len());
    let mut cursor = 0;
    for (span, value) in spans {
        out.push_str(&xml.text[cursor..span.start]);
        out.push_str(&escape_attribute_value(&value));
        cursor = span.end;
    }
    out.push_str(&xml.text[cursor..]);
    out.into_bytes()
}

/// Finds the byte range of the `href` attribute's value within the opening
/// tag of `element_range`, tolerating any namespace prefix bound to it
/// (`xlink:href`, `ns2:href`, bare `href`, ...).
fn find_href_value_span(text: &str, element_range: &Range<usize>) -> Option<Range<usize>> {
    let open_tag_end = text[element_range.clone()].find('>')? + element_range.start;
    let open_tag = &text[element_range.start..open_tag_end];

    let attr_pos = open_tag.rfind("href=")?;
    let value_start_rel = attr_pos + "href=".len();
    let quote_char = *open_tag.as_bytes().get(value_start_rel)? as char;
    if quote_char != '"' && quote_char != '\'' {
        return None;
    }

    let after_quote = value_start_rel + 1;
    let value_len = open_tag[after_quote..].find(quote_char)?;
    let value_start = element_range.start + after_quote;
    let value_end = value_start + value_len;
    Some(value_start..value_end)
}

fn escape_attribute_value(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<article xmlns:xlink="http://www.w3.org/1999/xlink">
  <body>
    <p>
      <graphic xlink:href="gf01"/>
      <media xlink:href="sm01" mimetype="video"/>
    </p>
  </body>
</article>"#;

    #[test]
    fn enumerates_assets_in_document_order() {
        let (_, refs) = enumerate_assets(SAMPLE.to_string()).unwrap();
        let ids: Vec<_> = refs.iter().map(|r| r.asset_id.as_str()).collect();
        assert_eq!(ids, vec!["gf01", "sm01"]);
    }

    #[test]
    fn rewrites_hrefs_without_disturbing_surrounding_text() {
        let (xml, refs) = enumerate_assets(SAMPLE.to_string()).unwrap();
        let rewritten = rewrite_hrefs(&xml, &refs, |asset_id| match asset_id {
            "gf01" => "https://assets/v2/gf01.gif".to_string(),
            _ => String::new(),
        });
        let rewritten = String::from_utf8(rewritten).unwrap();
        assert!(rewritten.contains(r#"xlink:href="https://assets/v2/gf01.gif""#));
        assert!(rewritten.contains(r#"xlink:href=""#));
        assert!(rewritten.contains("mimetype=\"video\""));
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(enumerate_assets("<unclosed>".to_string()).is_err());
    }
}
