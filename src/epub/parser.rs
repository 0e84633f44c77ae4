//! EPUB parsing utilities (OPF package documents, container.xml)

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Reader};

use crate::book::{BookMetadata, Identifier};
use crate::error::{Error, Result};
use crate::util::decode_xml;

pub const OPF_NS: &[u8] = b"http://www.idpf.org/2007/opf";
pub const DC_NS: &[u8] = b"http://purl.org/dc/elements/1.1/";

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = decode_xml(bytes);

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if local_name(e.name().as_ref()) == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        let path = unescape(&String::from_utf8(attr.value.to_vec())
                            .map_err(|e| Error::MalformedMetadata(e.to_string()))?);
                        if !path.is_empty() {
                            return Ok(path);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::MalformedMetadata(
        "no rootfile found in container.xml".into(),
    ))
}

/// Parse an OPF package document into [`BookMetadata`].
///
/// Dublin Core fields are read from the `<metadata>` child of the root
/// element, matched by namespace rather than prefix. The cover href is
/// resolved afterwards with [`resolve_cover`] over the whole document.
///
/// Fails with [`Error::MalformedMetadata`] when the document is not
/// well-formed XML or has no `<metadata>` element.
pub fn parse_opf(content: &str) -> Result<BookMetadata> {
    let mut reader = NsReader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut scan = OpfScan::default();
    let mut depth = 0usize;
    let mut metadata_depth: Option<usize> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::MalformedMetadata(e.to_string()))?;
        let ns = Ns::from(ns);

        match event {
            Event::Start(e) => {
                depth += 1;
                scan.open(ns, &e, depth, &mut metadata_depth, &mut capture)?;
            }
            Event::Empty(e) => {
                scan.open(ns, &e, depth + 1, &mut metadata_depth, &mut capture)?;
                scan.close(depth + 1, &mut metadata_depth, &mut capture);
            }
            Event::Text(e) => {
                if let Some(cap) = capture.as_mut()
                    && cap.depth == depth
                {
                    cap.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if let Some(cap) = capture.as_mut()
                    && cap.depth == depth
                {
                    cap.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(cap) = capture.as_mut()
                    && cap.depth == depth
                {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        cap.text.push_str(&resolved);
                    }
                }
            }
            Event::End(_) => {
                scan.close(depth, &mut metadata_depth, &mut capture);
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::MalformedMetadata(
            "unexpected end of document".into(),
        ));
    }
    if !scan.found_metadata {
        return Err(Error::MalformedMetadata(
            "package has no <metadata> element".into(),
        ));
    }

    let cover_reference = resolve_cover(&scan.guide, &scan.manifest, scan.meta_cover.as_deref());
    debug!("resolved cover reference: {cover_reference:?}");

    let fields = scan.fields;
    Ok(BookMetadata {
        title: fields.title.flatten(),
        creators: fields.creators,
        publishers: fields.publishers,
        date: fields.date.flatten(),
        source: fields.source.flatten(),
        rights: fields.rights.flatten(),
        language_code: fields.language.flatten(),
        summary: fields.description.flatten(),
        subjects: fields.subjects,
        identifier: fields.identifier,
        cover_reference,
    })
}

/// A `<guide><reference>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuideReference {
    pub kind: Option<String>,
    pub title: Option<String>,
    pub href: Option<String>,
}

/// A `<manifest><item>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: Option<String>,
    pub href: Option<String>,
    pub properties: Option<String>,
}

/// Pick the cover href from the guide, the manifest and `<meta name="cover">`.
///
/// 1. First guide reference typed `cover`, titled `Cover`, or typed
///    `title-page`/`tp`, with any `#fragment` removed. Scanning stops there
///    even when that href is missing or fragment-only.
/// 2. Otherwise the first manifest item whose id is `cover-image` or `cover`,
///    or whose `properties` is `cover-image`.
/// 3. A `<meta name="cover">` naming a manifest id overrides both. When no
///    item carries that id, its content is used as the href only if nothing
///    else matched.
pub fn resolve_cover(
    guide: &[GuideReference],
    manifest: &[ManifestItem],
    meta_cover: Option<&str>,
) -> Option<String> {
    // The first matching reference ends the guide scan. An empty href still
    // counts as a match for the steps below and is dropped at the end.
    let mut cover = guide
        .iter()
        .find(|reference| {
            let kind = reference.kind.as_deref();
            kind == Some("cover")
                || reference.title.as_deref() == Some("Cover")
                || matches!(kind, Some("title-page") | Some("tp"))
        })
        .map(|reference| {
            let href = reference.href.as_deref().unwrap_or_default();
            href.split('#').next().unwrap_or_default().to_string()
        });

    if cover.is_none() {
        cover = manifest
            .iter()
            .find(|item| {
                matches!(item.id.as_deref(), Some("cover-image") | Some("cover"))
                    || item.properties.as_deref() == Some("cover-image")
            })
            .and_then(|item| item.href.clone());
    }

    if let Some(meta_id) = meta_cover.filter(|id| !id.is_empty()) {
        match manifest.iter().find(|item| item.id.as_deref() == Some(meta_id)) {
            Some(item) => {
                if item.href.is_some() {
                    cover = item.href.clone();
                }
            }
            None if cover.is_none() => cover = Some(meta_id.to_string()),
            None => {}
        }
    }

    cover.filter(|href| !href.is_empty())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Ns {
    Opf,
    Dc,
    Other,
}

impl From<ResolveResult<'_>> for Ns {
    fn from(result: ResolveResult<'_>) -> Self {
        match result {
            ResolveResult::Bound(Namespace(OPF_NS)) => Ns::Opf,
            ResolveResult::Bound(Namespace(DC_NS)) => Ns::Dc,
            _ => Ns::Other,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DcField {
    Title,
    Creator,
    Publisher,
    Date,
    Source,
    Rights,
    Language,
    Description,
    Subject,
    Identifier,
}

impl DcField {
    fn from_local(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"title" => DcField::Title,
            b"creator" => DcField::Creator,
            b"publisher" => DcField::Publisher,
            b"date" => DcField::Date,
            b"source" => DcField::Source,
            b"rights" => DcField::Rights,
            b"language" => DcField::Language,
            b"description" => DcField::Description,
            b"subject" => DcField::Subject,
            b"identifier" => DcField::Identifier,
            _ => return None,
        })
    }
}

/// Text being collected for an open Dublin Core element.
struct Capture {
    field: DcField,
    depth: usize,
    text: String,
    id: Option<String>,
}

/// Scalar fields are `Some(_)` once their first element has been seen, so a
/// later element never replaces an earlier empty one.
#[derive(Default)]
struct DcFields {
    title: Option<Option<String>>,
    date: Option<Option<String>>,
    source: Option<Option<String>>,
    rights: Option<Option<String>>,
    language: Option<Option<String>>,
    description: Option<Option<String>>,
    creators: Vec<String>,
    publishers: Vec<String>,
    subjects: Vec<String>,
    identifier: Option<Identifier>,
}

impl DcFields {
    fn finish(&mut self, cap: Capture) {
        let text = cap.text.trim();
        let value = (!text.is_empty()).then(|| text.to_string());

        let first = |slot: &mut Option<Option<String>>| {
            if slot.is_none() {
                *slot = Some(value.clone());
            }
        };

        match cap.field {
            DcField::Title => first(&mut self.title),
            DcField::Date => first(&mut self.date),
            DcField::Source => first(&mut self.source),
            DcField::Rights => first(&mut self.rights),
            DcField::Language => first(&mut self.language),
            DcField::Description => first(&mut self.description),
            DcField::Creator => self.creators.push(text.to_string()),
            DcField::Publisher => self.publishers.push(text.to_string()),
            DcField::Subject => self.subjects.push(text.to_string()),
            DcField::Identifier => {
                if self.identifier.is_none() {
                    self.identifier = Some(Identifier::new(cap.id, value));
                }
            }
        }
    }
}

#[derive(Default)]
struct OpfScan {
    found_metadata: bool,
    fields: DcFields,
    guide: Vec<GuideReference>,
    manifest: Vec<ManifestItem>,
    meta_cover: Option<String>,
}

impl OpfScan {
    fn open(
        &mut self,
        ns: Ns,
        e: &BytesStart<'_>,
        depth: usize,
        metadata_depth: &mut Option<usize>,
        capture: &mut Option<Capture>,
    ) -> Result<()> {
        let name = e.local_name();
        let local = name.as_ref();

        match (ns, local) {
            (Ns::Opf, b"metadata") if depth == 2 && !self.found_metadata => {
                self.found_metadata = true;
                *metadata_depth = Some(depth);
            }
            (Ns::Opf, b"meta") if *metadata_depth == Some(depth - 1) => {
                if attribute(e, b"name")?.as_deref() == Some("cover") {
                    self.meta_cover = attribute(e, b"content")?;
                }
            }
            (Ns::Opf, b"reference") => self.guide.push(GuideReference {
                kind: attribute(e, b"type")?,
                title: attribute(e, b"title")?,
                href: attribute(e, b"href")?,
            }),
            (Ns::Opf, b"item") => self.manifest.push(ManifestItem {
                id: attribute(e, b"id")?,
                href: attribute(e, b"href")?,
                properties: attribute(e, b"properties")?,
            }),
            (Ns::Dc, _) if metadata_depth.is_some() && capture.is_none() => {
                if let Some(field) = DcField::from_local(local) {
                    let id = if field == DcField::Identifier {
                        attribute(e, b"id")?
                    } else {
                        None
                    };
                    *capture = Some(Capture {
                        field,
                        depth,
                        text: String::new(),
                        id,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(
        &mut self,
        depth: usize,
        metadata_depth: &mut Option<usize>,
        capture: &mut Option<Capture>,
    ) {
        if capture.as_ref().is_some_and(|cap| cap.depth == depth)
            && let Some(cap) = capture.take()
        {
            self.fields.finish(cap);
        }
        if *metadata_depth == Some(depth) {
            *metadata_depth = None;
        }
    }
}

/// Value of an unprefixed attribute, with entity references resolved.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::MalformedMetadata(err.to_string()))?;
        if attr.key.as_ref() == key {
            let raw = String::from_utf8(attr.value.to_vec())
                .map_err(|err| Error::MalformedMetadata(err.to_string()))?;
            return Ok(Some(unescape(&raw)));
        }
    }
    Ok(None)
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Replace `&name;` references in an attribute value.
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find(';').and_then(|end| Some((end, resolve_entity(&tail[..end])?))) {
            Some((end, resolved)) => {
                out.push_str(&resolved);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}
