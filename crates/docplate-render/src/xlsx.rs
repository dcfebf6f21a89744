//! Spreadsheet (xlsx) renderer.
//!
//! Placeholders usually sit in shared strings, away from the cells that use
//! them. Each worksheet is prepared so its placeholders live in the sheet XML
//! itself, then the whole sheet is rendered as one template. A block that
//! opens in one row and closes in a later one repeats whole rows; the rows
//! are renumbered afterwards.

use crate::container::Container;
use crate::{RenderError, Renderer};
use docplate_engine::{RenderCache, Scope, TemplateEngine};
use docplate_stream::{ReplaceTagsExt, XmlTagReplacer};
use futures::future::BoxFuture;
use futures::TryStreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const WORKSHEETS: &str = "xl/worksheets/";
const CHUNK_SIZE: usize = 16 * 1024;

/// A shared-string cell: `<c r="A1" t="s"><v>3</v></c>`.
static SHARED_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<c\b([^>]*)>\s*<v>(\d+)</v>\s*</c>").expect("shared cell pattern is valid")
});

static SHARED_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bt="s""#).expect("shared type pattern is valid"));

static ROW_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<row\b([^>]*?)(/?)>").expect("row pattern is valid"));

static ROW_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\br="(\d+)""#).expect("row number pattern is valid"));

static CELL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<c\b[^>]*?\br=")([A-Z]+)(\d+)(")"#).expect("cell reference pattern is valid")
});

/// Renders every worksheet of a workbook, in container order.
pub struct XlsxRenderer<'a> {
    container: &'a mut Container,
    engine: &'a TemplateEngine,
    cache: RenderCache,
}

pub(crate) fn create<'a>(
    container: &'a mut Container,
    engine: &'a TemplateEngine,
) -> Box<dyn Renderer + 'a> {
    Box::new(XlsxRenderer::new(container, engine))
}

impl<'a> XlsxRenderer<'a> {
    pub fn new(container: &'a mut Container, engine: &'a TemplateEngine) -> Self {
        Self {
            container,
            engine,
            cache: RenderCache::new(),
        }
    }

    /// Worksheet part names, in container order.
    pub fn worksheets(&self) -> Vec<String> {
        self.container
            .names()
            .filter(|name| name.starts_with(WORKSHEETS) && name.ends_with(".xml"))
            .map(str::to_string)
            .collect()
    }

    /// Rendered XML of one worksheet, or `None` if the part is missing.
    async fn render_sheet(
        &mut self,
        part: &str,
        strings: &[String],
        scope: &Scope,
    ) -> Result<Option<String>, RenderError> {
        let Some(source) = self.container.stream_part(part, CHUNK_SIZE) else {
            return Ok(None);
        };

        // The used range is stale as soon as a block repeats rows.
        let chunks: Vec<String> = Box::pin(source)
            .replace_tags(XmlTagReplacer::new("dimension", ""))
            .try_collect()
            .await?;

        let finder = self.engine.options().tag_finder();
        let xml = inline_shared_strings(&chunks.concat(), strings, finder);
        let rendered = self
            .engine
            .render_with_cache(&xml, scope, &mut self.cache)
            .await
            .map_err(|source| RenderError::Engine {
                part: part.to_string(),
                source,
            })?;

        Ok(Some(renumber_rows(&rendered)))
    }
}

impl Renderer for XlsxRenderer<'_> {
    fn render<'b>(&'b mut self, scope: &'b Scope) -> BoxFuture<'b, Result<(), RenderError>> {
        Box::pin(async move {
            let strings = match self.container.get_str(SHARED_STRINGS)? {
                Some(xml) => read_shared_strings(xml)?,
                None => Vec::new(),
            };
            let sheets = self.worksheets();
            tracing::debug!(
                sheets = sheets.len(),
                shared_strings = strings.len(),
                "XlsxRenderer::render: rendering workbook"
            );

            // The container is only touched once every sheet has rendered.
            let mut rendered = Vec::with_capacity(sheets.len());
            for part in sheets {
                tracing::debug!(part = %part, "XlsxRenderer::render: rendering worksheet");
                if let Some(xml) = self.render_sheet(&part, &strings, scope).await? {
                    rendered.push((part, xml));
                }
            }
            for (part, xml) in rendered {
                self.container.set(part, xml);
            }
            Ok(())
        })
    }
}

/// Plain text of every `<si>` entry of a shared-strings part. Rich-text runs
/// are concatenated; phonetic hints are skipped.
pub fn read_shared_strings(xml: &str) -> Result<Vec<String>, RenderError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => phonetic += 1,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_text = false,
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                _ => {}
            },
            Event::Text(text) if in_text && phonetic == 0 => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&text.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// Turn shared-string cells whose string contains a placeholder into inline
/// string cells. Other cells are left alone.
pub fn inline_shared_strings(xml: &str, strings: &[String], tag_finder: &Regex) -> String {
    SHARED_CELL
        .replace_all(xml, |caps: &Captures| {
            let attrs = &caps[1];
            let text = caps[2].parse::<usize>().ok().and_then(|i| strings.get(i));
            match text {
                Some(text) if SHARED_TYPE.is_match(attrs) && tag_finder.is_match(text) => format!(
                    r#"<c{}><is><t xml:space="preserve">{}</t></is></c>"#,
                    SHARED_TYPE.replace(attrs, r#"t="inlineStr""#),
                    escape_text(text)
                ),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Give every `<row>` a row number greater than the previous one, moving
/// later rows down by as much as earlier rows were repeated. Cell references
/// inside a row follow its new number.
pub fn renumber_rows(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut pos = 0;
    let mut last = 0u64;
    let mut shift = 0u64;

    while let Some(caps) = ROW_START.captures_at(xml, pos) {
        let Some(whole) = caps.get(0) else { break };
        out.push_str(&xml[pos..whole.start()]);

        let attrs = &caps[1];
        let self_closing = !caps[2].is_empty();
        let row = match ROW_NUMBER.captures(attrs).and_then(|c| c[1].parse::<u64>().ok()) {
            Some(original) => {
                let row = (original + shift).max(last + 1);
                shift = row - original;
                row
            }
            None => last + 1,
        };
        last = row;

        out.push_str("<row");
        out.push_str(&ROW_NUMBER.replace(attrs, format!(r#"r="{row}""#)));
        out.push_str(if self_closing { "/>" } else { ">" });
        pos = whole.end();
        if self_closing {
            continue;
        }

        let body_end = xml[pos..].find("</row>").map_or(xml.len(), |i| pos + i);
        let body = CELL_REF.replace_all(&xml[pos..body_end], |c: &Captures| {
            format!("{}{}{}{}", &c[1], &c[2], row, &c[4])
        });
        out.push_str(&body);
        pos = body_end;
    }

    out.push_str(&xml[pos..]);
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer_for;
    use docplate_engine::{data, parser_fn, EngineError, EngineOptions, Escape, PathParser};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    const SHARED: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<sst count="4" uniqueCount="4">"#,
        "<si><t>Name</t></si>",
        "<si><t>[[#row rows]][[row.name]]</t></si>",
        "<si><r><t>[[row.qty]]</t></r></si>",
        "<si><t>[[/row]]Total</t></si>",
        "</sst>",
    );

    const SHEET: &str = concat!(
        r#"<worksheet><dimension ref="A1:B3"/><sheetData>"#,
        r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#,
        r#"<row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2" s="1" t="s"><v>2</v></c></row>"#,
        r#"<row r="3"><c r="A3" t="s"><v>3</v></c></row>"#,
        "</sheetData></worksheet>",
    );

    fn xml_engine(parser: impl docplate_engine::Parser + 'static) -> TemplateEngine {
        TemplateEngine::with_options(parser, EngineOptions::new().with_escape(Escape::Xml))
    }

    fn workbook(sheets: &[(&str, &str)]) -> Container {
        let mut c = Container::new();
        c.set("[Content_Types].xml", "<Types/>");
        c.set(SHARED_STRINGS, SHARED);
        for (name, xml) in sheets {
            c.set(*name, *xml);
        }
        c
    }

    // =========================================================================
    // Shared strings
    // =========================================================================

    #[test]
    fn test_read_shared_strings() {
        let xml = concat!(
            "<sst><si><t>a &amp; b</t></si><si/>",
            r#"<si><r><t>x</t></r><r><t xml:space="preserve"> y</t></r><rPh><t>ignored</t></rPh></si>"#,
            "</sst>",
        );
        assert_eq!(read_shared_strings(xml).unwrap(), vec!["a & b", "", "x y"]);
        assert_eq!(read_shared_strings(SHARED).unwrap()[2], "[[row.qty]]");
    }

    #[test]
    fn test_inline_only_placeholder_strings() {
        let strings = vec!["Name".to_string(), "[[a]] < b".to_string()];
        let finder = EngineOptions::default().tag_finder().clone();
        let xml = concat!(
            r#"<c r="A1" t="s"><v>0</v></c>"#,
            r#"<c r="B1" s="2" t="s"><v>1</v></c>"#,
            r#"<c r="C1"><v>1</v></c>"#,
            r#"<c r="D1" t="s"><v>9</v></c>"#,
        );
        assert_eq!(
            inline_shared_strings(xml, &strings, &finder),
            concat!(
                r#"<c r="A1" t="s"><v>0</v></c>"#,
                r#"<c r="B1" s="2" t="inlineStr"><is><t xml:space="preserve">[[a]] &lt; b</t></is></c>"#,
                r#"<c r="C1"><v>1</v></c>"#,
                r#"<c r="D1" t="s"><v>9</v></c>"#,
            )
        );
    }

    // =========================================================================
    // Row numbering
    // =========================================================================

    #[test]
    fn test_renumber_rows() {
        let xml = concat!(
            r#"<sheetData><row r="1"><c r="A1"/></row>"#,
            r#"<row r="5" spans="1:2"><c r="A5"><v>1</v></c><c r="B5"/></row>"#,
            r#"<row r="5"><c r="A5"/></row>"#,
            r#"<row r="2"/>"#,
            r#"<row><c r="C9"/></row></sheetData>"#,
        );
        assert_eq!(
            renumber_rows(xml),
            concat!(
                r#"<sheetData><row r="1"><c r="A1"/></row>"#,
                r#"<row r="5" spans="1:2"><c r="A5"><v>1</v></c><c r="B5"/></row>"#,
                r#"<row r="6"><c r="A6"/></row>"#,
                r#"<row r="7"/>"#,
                r#"<row><c r="C8"/></row></sheetData>"#,
            )
        );
    }

    #[test]
    fn test_renumber_leaves_ordered_rows_alone() {
        let xml = r#"<row r="1"><c r="A1"/></row><row r="3"><c r="B3"/></row><rowBreaks/>"#;
        assert_eq!(renumber_rows(xml), xml);
    }

    // =========================================================================
    // Whole workbook
    // =========================================================================

    #[tokio::test]
    async fn test_block_repeats_rows() {
        let mut container = workbook(&[("xl/worksheets/sheet1.xml", SHEET)]);
        let engine = xml_engine(PathParser);
        let scope = Scope::from_value(json!({
            "rows": [ { "name": "A&B", "qty": 1 }, { "name": "C", "qty": 2 } ]
        }))
        .unwrap();

        let create = renderer_for("xlsx").unwrap();
        create(&mut container, &engine).render(&scope).await.unwrap();

        let sheet = container.get_str("xl/worksheets/sheet1.xml").unwrap().unwrap();
        assert_eq!(
            sheet,
            concat!(
                "<worksheet><sheetData>",
                r#"<row r="1"><c r="A1" t="s"><v>0</v></c></row>"#,
                r#"<row r="2"><c r="A2" t="inlineStr"><is><t xml:space="preserve">A&amp;B</t></is></c>"#,
                r#"<c r="B2" s="1" t="inlineStr"><is><t xml:space="preserve">1</t></is></c></row>"#,
                r#"<row r="3"><c r="A3" t="inlineStr"><is><t xml:space="preserve">C</t></is></c>"#,
                r#"<c r="B3" s="1" t="inlineStr"><is><t xml:space="preserve">2</t></is></c></row>"#,
                r#"<row r="4"><c r="A4" t="inlineStr"><is><t xml:space="preserve">Total</t></is></c></row>"#,
                "</sheetData></worksheet>",
            )
        );
        assert_eq!(container.get_str("[Content_Types].xml").unwrap(), Some("<Types/>"));
    }

    #[tokio::test]
    async fn test_cache_shared_across_sheets() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>[[n]]</t></is></c></row></sheetData></worksheet>"#;
        let mut container = workbook(&[
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/worksheets/_rels/sheet1.xml.rels", "<Relationships/>"),
            ("xl/worksheets/sheet2.xml", sheet),
        ]);
        let engine = xml_engine(parser_fn(|expr, _, cache| {
            let n = cache.get(expr).and_then(Value::as_u64).unwrap_or(0) + 1;
            cache.insert(expr, json!(n));
            Ok(Some(data(n)))
        }));

        let mut renderer = XlsxRenderer::new(&mut container, &engine);
        assert_eq!(
            renderer.worksheets(),
            vec!["xl/worksheets/sheet1.xml", "xl/worksheets/sheet2.xml"]
        );
        renderer.render(&Scope::new()).await.unwrap();

        let first = container.get_str("xl/worksheets/sheet1.xml").unwrap().unwrap();
        let second = container.get_str("xl/worksheets/sheet2.xml").unwrap().unwrap();
        assert!(first.contains("<t>1</t>"), "{first}");
        assert!(second.contains("<t>2</t>"), "{second}");
    }

    #[tokio::test]
    async fn test_template_error_names_part() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>[[#rows]]</t></is></c></row></sheetData></worksheet>"#;
        let mut container = workbook(&[("xl/worksheets/sheet1.xml", sheet)]);
        let engine = xml_engine(PathParser);

        let err = XlsxRenderer::new(&mut container, &engine)
            .render(&Scope::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Engine { ref part, source: EngineError::Unclosed { .. } }
                if part == "xl/worksheets/sheet1.xml"
        ));
    }

    #[tokio::test]
    async fn test_failed_render_leaves_container_untouched() {
        let good = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>[[n]]</t></is></c></row></sheetData></worksheet>"#;
        let bad = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>[[#rows]]</t></is></c></row></sheetData></worksheet>"#;
        let mut container = workbook(&[
            ("xl/worksheets/sheet1.xml", good),
            ("xl/worksheets/sheet2.xml", bad),
        ]);
        let engine = xml_engine(PathParser);
        let scope = Scope::from_iter([("n", 7)]);

        let err = XlsxRenderer::new(&mut container, &engine)
            .render(&scope)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Engine { ref part, .. } if part == "xl/worksheets/sheet2.xml"
        ));
        assert_eq!(container.get_str("xl/worksheets/sheet1.xml").unwrap(), Some(good));
        assert_eq!(container.get_str("xl/worksheets/sheet2.xml").unwrap(), Some(bad));
    }
}
