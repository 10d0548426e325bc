//! Minimal front-matter sanitizer for `GET /documents/{id}/front`.
//!
//! The original delegates to the external `clea` library for a full
//! bibliographic-citation-style extraction; that's out of scope here (spec
//! §4.7). This derives a small normalized view — title, abstract, author
//! names — directly from the same JATS-ish XML `object_store` already
//! fetched, read-only via `roxmltree` exactly like asset enumeration does.

use serde::Serialize;

use errors::KernelError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContribName {
    pub given_names: String,
    pub surname: String,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct FrontMatter {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,
    pub contribs: Vec<ContribName>,
}

/// Extracts title/abstract/contrib names from `xml`. Unparseable XML
/// surfaces as [`KernelError::Terminal`] rather than an empty front-matter
/// view — a front-matter request for a document whose data can't parse
/// indicates a real data problem worth surfacing as an error.
pub fn sanitize_document_front(xml: &[u8]) -> Result<FrontMatter, KernelError> {
    let text = std::str::from_utf8(xml).map_err(|err| KernelError::Terminal(format!("non-utf8 XML: {err}")))?;
    let doc = roxmltree::Document::parse(text).map_err(|err| KernelError::Terminal(format!("invalid XML: {err}")))?;

    let title = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "article-title")
        .map(collect_text);

    let abstract_ = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "abstract")
        .map(collect_text);

    let contribs = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "contrib")
        .filter_map(|contrib| {
            let name = contrib.descendants().find(|n| n.is_element() && n.tag_name().name() == "name")?;
            let given_names = child_text(name, "given-names");
            let surname = child_text(name, "surname");
            if given_names.is_empty() && surname.is_empty() {
                return None;
            }
            Some(ContribName { given_names, surname })
        })
        .collect();

    Ok(FrontMatter { title, abstract_, contribs })
}

fn child_text(node: roxmltree::Node, tag: &str) -> String {
    node.descendants().find(|n| n.is_element() && n.tag_name().name() == tag).map(collect_text).unwrap_or_default()
}

fn collect_text(node: roxmltree::Node) -> String {
    node.descendants().filter(|n| n.is_text()).filter_map(|n| n.text()).collect::<Vec<_>>().join("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<article>
  <front>
    <article-meta>
      <title-group><article-title>A Study of Things</article-title></title-group>
      <contrib-group>
        <contrib contrib-type="author">
          <name><surname>Silva</surname><given-names>Maria</given-names></name>
        </contrib>
      </contrib-group>
      <abstract><p>This is the abstract.</p></abstract>
    </article-meta>
  </front>
</article>"#;

    #[test]
    fn extracts_title_abstract_and_contrib_names() {
        let front = sanitize_document_front(SAMPLE.as_bytes()).unwrap();
        assert_eq!(front.title.as_deref(), Some("A Study of Things"));
        assert_eq!(front.abstract_.as_deref(), Some("This is the abstract."));
        assert_eq!(front.contribs, vec![ContribName { given_names: "Maria".to_string(), surname: "Silva".to_string() }]);
    }

    #[test]
    fn missing_sections_yield_none_and_empty_contribs() {
        let front = sanitize_document_front(b"<article/>").unwrap();
        assert_eq!(front, FrontMatter::default());
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(sanitize_document_front(b"<unclosed>").is_err());
    }
}
