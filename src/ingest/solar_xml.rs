//! Solar-terrestrial XML feed parser.
//!
//! Turns the raw body of the propagation feed into a [`Snapshot`]. The
//! document is streamed with quick-xml's pull reader; see `fixtures.rs`
//! for annotated examples of the payload.
//!
//! The text of an element is whatever was read since the last tag
//! boundary, trimmed when the element closes. Elements the parser does not
//! know are skipped, so additions to the feed schema never break ingestion.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::encoding::Decoder;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::model::{BandCondition, ParseError, Snapshot, VhfCondition};

const BAND_SECTION: &str = "calculatedconditions";
const BAND_ITEM: &str = "band";
const VHF_SECTION: &str = "calculatedvhfconditions";
const VHF_ITEM: &str = "phenomenon";
const SOURCE: &str = "source";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses a feed body into a `Snapshot`.
///
/// The body is decoded in the charset its XML declaration names (the live
/// feed declares ISO-8859-1); without a declaration it must be UTF-8.
/// Scalars keep their trimmed text verbatim. Band and phenomenon items are
/// appended in document order; duplicates are kept (lookups resolve them).
/// Missing elements leave their fields empty.
///
/// # Errors
/// - `ParseError::EmptyInput` - `raw` has zero length.
/// - `ParseError::MalformedXml` - bytes invalid in the document's encoding,
///   a syntax error, mismatched or unclosed tags, no root element, several
///   root elements, or text outside the root.
pub fn parse_solar_xml(raw: &[u8]) -> Result<Snapshot, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let mut reader = Reader::from_reader(raw);
    let mut builder = SnapshotBuilder::default();
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::malformed(reader.error_position(), e.to_string()))?;
        // Re-read every event: the declaration may switch the charset.
        let decoder = reader.decoder();

        match event {
            Event::Start(e) => builder.open(&e, decoder, position)?,
            Event::Empty(e) => {
                builder.open(&e, decoder, position)?;
                let qname = e.name();
                let name = decode(decoder, qname.as_ref(), position)?;
                builder.close(&name, position)?;
            }
            Event::End(e) => {
                let qname = e.name();
                let name = decode(decoder, qname.as_ref(), position)?;
                builder.close(&name, position)?;
            }
            Event::Text(e) => {
                let chunk = decode(decoder, &e, position)?;
                let chunk = unescape(&chunk)
                    .map_err(|err| ParseError::malformed(position, err.to_string()))?;
                builder.push_text(&chunk, position)?;
            }
            Event::CData(e) => builder.push_text(&decode(decoder, &e, position)?, position)?,
            Event::GeneralRef(e) => {
                let name = decode(decoder, &e, position)?;
                let reference = format!("&{};", name);
                let resolved = unescape(&reference)
                    .map_err(|err| ParseError::malformed(position, err.to_string()))?;
                builder.push_text(&resolved, position)?;
            }
            Event::Eof => break,
            // XML declaration, comments, processing instructions, DOCTYPE
            _ => {}
        }

        buf.clear();
    }

    builder.finish(reader.buffer_position())
}

/// Decodes raw bytes with the document's charset.
fn decode<'b>(decoder: Decoder, bytes: &'b [u8], position: u64) -> Result<Cow<'b, str>, ParseError> {
    decoder.decode(bytes).map_err(|e| {
        ParseError::malformed(
            position,
            format!("invalid {} text: {}", decoder.encoding().name(), e),
        )
    })
}

fn attributes(
    e: &BytesStart<'_>,
    decoder: Decoder,
    position: u64,
) -> Result<HashMap<String, String>, ParseError> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(position, err.to_string()))?;
        let key = decode(decoder, attr.key.as_ref(), position)?;
        let raw_value = decode(decoder, attr.value.as_ref(), position)?;
        let value =
            unescape(&raw_value).map_err(|err| ParseError::malformed(position, err.to_string()))?;
        out.insert(key.into_owned(), value.into_owned());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Builder state
// ---------------------------------------------------------------------------

/// Accumulates a snapshot while events stream past.
#[derive(Default)]
struct SnapshotBuilder {
    snapshot: Snapshot,
    open_elements: Vec<String>,
    roots_seen: usize,
    text: String,
    in_band_section: bool,
    in_vhf_section: bool,
    band: Option<BandCondition>,
    phenomenon: Option<VhfCondition>,
}

impl SnapshotBuilder {
    fn open(&mut self, e: &BytesStart<'_>, decoder: Decoder, position: u64) -> Result<(), ParseError> {
        let name = decode(decoder, e.name().as_ref(), position)?.into_owned();

        if self.open_elements.is_empty() {
            if self.roots_seen > 0 {
                return Err(ParseError::malformed(
                    position,
                    format!("multiple root elements: <{}> after the document root closed", name),
                ));
            }
            self.roots_seen += 1;
        }

        self.text.clear();

        match name.as_str() {
            BAND_SECTION => self.in_band_section = true,
            VHF_SECTION => self.in_vhf_section = true,
            BAND_ITEM if self.in_band_section => {
                let mut attrs = attributes(e, decoder, position)?;
                self.band = Some(BandCondition {
                    band: attrs.remove("name").unwrap_or_default(),
                    time: attrs.remove("time").unwrap_or_default(),
                    condition: String::new(),
                });
            }
            VHF_ITEM if self.in_vhf_section => {
                let mut attrs = attributes(e, decoder, position)?;
                self.phenomenon = Some(VhfCondition {
                    phenomenon: attrs.remove("name").unwrap_or_default(),
                    location: attrs.remove("location").unwrap_or_default(),
                    condition: String::new(),
                });
            }
            SOURCE => {
                if let Some(url) = attributes(e, decoder, position)?.remove("url") {
                    self.snapshot.source_url = url;
                }
            }
            _ => {}
        }

        self.open_elements.push(name);
        Ok(())
    }

    fn close(&mut self, name: &str, position: u64) -> Result<(), ParseError> {
        match self.open_elements.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(ParseError::malformed(
                    position,
                    format!("expected </{}>, found </{}>", open, name),
                ));
            }
            None => {
                return Err(ParseError::malformed(
                    position,
                    format!("closing tag </{}> without a matching start tag", name),
                ));
            }
        }

        let text = self.text.trim().to_string();

        match name {
            BAND_SECTION => self.in_band_section = false,
            VHF_SECTION => self.in_vhf_section = false,
            BAND_ITEM => {
                if let Some(mut band) = self.band.take() {
                    band.condition = text;
                    self.snapshot.band_conditions.push(band);
                }
            }
            VHF_ITEM => {
                if let Some(mut phenomenon) = self.phenomenon.take() {
                    phenomenon.condition = text;
                    self.snapshot.vhf_conditions.push(phenomenon);
                }
            }
            tag => {
                if let Some(slot) = self.snapshot.scalar_mut(tag) {
                    *slot = text;
                }
            }
        }

        self.text.clear();
        Ok(())
    }

    fn push_text(&mut self, chunk: &str, position: u64) -> Result<(), ParseError> {
        if self.open_elements.is_empty() {
            if chunk.trim().is_empty() {
                return Ok(());
            }
            return Err(ParseError::malformed(position, "text outside the root element"));
        }
        self.text.push_str(chunk);
        Ok(())
    }

    fn finish(self, position: u64) -> Result<Snapshot, ParseError> {
        if let Some(open) = self.open_elements.last() {
            return Err(ParseError::malformed(
                position,
                format!("unexpected end of document: <{}> is not closed", open),
            ));
        }
        if self.roots_seen == 0 {
            return Err(ParseError::malformed(position, "document has no root element"));
        }
        Ok(self.snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diff::band_lookup;
    use crate::analysis::diff::vhf_lookup;
    use crate::ingest::fixtures::*;
    use crate::model::{BandKey, PhenomenonKey};

    fn parse(xml: &str) -> Result<Snapshot, ParseError> {
        parse_solar_xml(xml.as_bytes())
    }

    // --- Scalars ------------------------------------------------------------

    #[test]
    fn test_parse_full_feed_scalars_are_trimmed_text() {
        let snapshot = parse(fixture_full_feed_xml()).expect("fixture should parse");

        assert_eq!(snapshot.source, "N0NBH");
        assert_eq!(snapshot.source_url, "http://www.hamqsl.com/solar.html");
        assert_eq!(snapshot.updated, "16 Oct 2026 1200 GMT");
        assert_eq!(snapshot.solar_flux, "150");
        assert_eq!(snapshot.a_index, "7");
        assert_eq!(snapshot.k_index, "2");
        assert_eq!(snapshot.k_index_nt, "No Report");
        assert_eq!(snapshot.xray, "B7.4");
        assert_eq!(snapshot.sunspots, "112");
        assert_eq!(snapshot.helium_line, "128.4");
        assert_eq!(snapshot.proton_flux, "217");
        assert_eq!(snapshot.electron_flux, "1520");
        assert_eq!(snapshot.aurora, "1");
        assert_eq!(snapshot.normalization, "1.99");
        assert_eq!(snapshot.lat_degree, "67.5");
        assert_eq!(snapshot.solar_wind, "403.6");
        assert_eq!(snapshot.magnetic_field, "-1.3");
        assert_eq!(snapshot.geomag_field, "QUIET");
        assert_eq!(snapshot.signal_noise, "S0-S1");
        assert_eq!(snapshot.fof2, "7.25");
        assert_eq!(snapshot.muf_factor, "2.88");
        assert_eq!(snapshot.muf, "20.88");
    }

    #[test]
    fn test_parse_full_feed_collections_in_document_order() {
        let snapshot = parse(fixture_full_feed_xml()).expect("fixture should parse");

        assert_eq!(snapshot.band_conditions.len(), 8);
        let first = &snapshot.band_conditions[0];
        assert_eq!(first.band, "80m-40m");
        assert_eq!(first.time, "day");
        assert_eq!(first.condition, "Poor");
        let last = &snapshot.band_conditions[7];
        assert_eq!((last.band.as_str(), last.time.as_str()), ("12m-10m", "night"));
        assert_eq!(last.condition, "Poor");

        assert_eq!(snapshot.vhf_conditions.len(), 5);
        assert_eq!(snapshot.vhf_conditions[0].phenomenon, "vhf-aurora");
        assert_eq!(snapshot.vhf_conditions[0].location, "northern_hemi");
        assert_eq!(snapshot.vhf_conditions[0].condition, "Band Closed");
        assert_eq!(snapshot.vhf_conditions[3].condition, "50MHz ES");
    }

    #[test]
    fn test_parse_ignores_unknown_elements() {
        let snapshot = parse(fixture_full_feed_xml()).expect("fixture should parse");
        for (_, value) in snapshot.scalars() {
            assert_ne!(value, "ignored", "unknown element leaked into a field");
        }
    }

    #[test]
    fn test_parse_missing_elements_default_to_empty() {
        let snapshot = parse(fixture_empty_root_xml()).expect("empty root is well-formed");
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_parse_resolves_entities_and_cdata() {
        let xml = r#"<solar><signalnoise>S1 &amp; S2</signalnoise><xray><![CDATA[ <B7> ]]></xray><geomagfield>&#81;UIET</geomagfield></solar>"#;
        let snapshot = parse(xml).expect("should parse");
        assert_eq!(snapshot.signal_noise, "S1 & S2");
        assert_eq!(snapshot.xray, "<B7>");
        assert_eq!(snapshot.geomag_field, "QUIET");
    }

    #[test]
    fn test_parse_self_closing_item_has_empty_condition() {
        let xml = r#"<solar><calculatedconditions><band name="80m-40m" time="day"/></calculatedconditions></solar>"#;
        let snapshot = parse(xml).expect("should parse");
        assert_eq!(snapshot.band_conditions.len(), 1);
        assert_eq!(snapshot.band_conditions[0].condition, "");
    }

    #[test]
    fn test_parse_band_outside_its_section_is_ignored() {
        let xml = r#"<solar><band name="80m-40m" time="day">Good</band><calculatedvhfconditions><band name="x" time="day">Poor</band></calculatedvhfconditions></solar>"#;
        let snapshot = parse(xml).expect("should parse");
        assert!(snapshot.band_conditions.is_empty());
        assert!(snapshot.vhf_conditions.is_empty());
    }

    #[test]
    fn test_parse_missing_item_attributes_become_empty() {
        let xml = r#"<solar><calculatedvhfconditions><phenomenon name="E-Skip">Band Closed</phenomenon></calculatedvhfconditions></solar>"#;
        let snapshot = parse(xml).expect("should parse");
        assert_eq!(snapshot.vhf_conditions[0].location, "");
        assert_eq!(snapshot.vhf_conditions[0].condition, "Band Closed");
    }

    // --- Key collisions -------------------------------------------------------

    #[test]
    fn test_duplicate_band_keeps_both_items_and_lookup_takes_last() {
        let snapshot = parse(fixture_duplicate_band_xml()).expect("fixture should parse");
        assert_eq!(snapshot.band_conditions.len(), 3, "parser keeps every item");

        let lookup = band_lookup(&snapshot.band_conditions);
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup[&BandKey::new("80m-40m", "day")], "Good");

        let vhf = vhf_lookup(&snapshot.vhf_conditions);
        assert_eq!(vhf[&PhenomenonKey::new("E-Skip", "europe")], "50MHz ES");
    }

    // --- Errors -------------------------------------------------------------

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_solar_xml(b""), Err(ParseError::EmptyInput));
    }

    #[test]
    fn test_parse_truncated_document_is_malformed() {
        let result = parse(fixture_truncated_xml());
        assert!(
            matches!(result, Err(ParseError::MalformedXml { .. })),
            "truncated document should be malformed, got {:?}",
            result
        );
    }

    #[test]
    fn test_parse_mismatched_tags_is_malformed() {
        let result = parse("<solar><solarflux>150</kindex></solar>");
        assert!(matches!(result, Err(ParseError::MalformedXml { .. })));
    }

    #[test]
    fn test_parse_invalid_utf8_is_malformed() {
        let result = parse_solar_xml(&[b'<', b's', b'>', 0xFF, 0xFE, b'<', b'/', b's', b'>']);
        match result {
            Err(ParseError::MalformedXml { message, .. }) => {
                assert!(message.contains("UTF-8"), "message was: {}", message)
            }
            other => panic!("expected MalformedXml, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_latin1_feed_uses_declared_encoding() {
        let snapshot =
            parse_solar_xml(&fixture_latin1_feed_bytes()).expect("Latin-1 feed should parse");
        assert_eq!(snapshot.lat_degree, "67.5\u{b0}");
        assert_eq!(snapshot.vhf_conditions.len(), 1);
        assert_eq!(snapshot.vhf_conditions[0].condition, "Band Closed");
    }

    #[test]
    fn test_parse_latin1_byte_in_utf8_declared_feed_is_malformed() {
        let raw = fixture_latin1_feed_bytes();
        let declared_utf8: Vec<u8> = String::from_utf8_lossy(&raw[..44])
            .replace("ISO-8859-1", "UTF-8")
            .into_bytes()
            .into_iter()
            .chain(raw[44..].iter().copied())
            .collect();
        let result = parse_solar_xml(&declared_utf8);
        assert!(
            matches!(result, Err(ParseError::MalformedXml { .. })),
            "0xB0 is not valid UTF-8, got {:?}",
            result
        );
    }

    #[test]
    fn test_parse_whitespace_only_has_no_root() {
        let result = parse("   \n  ");
        assert!(matches!(result, Err(ParseError::MalformedXml { .. })));
    }

    #[test]
    fn test_parse_two_roots_is_malformed() {
        let result = parse("<solar></solar><solar></solar>");
        assert!(matches!(result, Err(ParseError::MalformedXml { .. })));
    }

    #[test]
    fn test_parse_plain_text_is_malformed() {
        let result = parse("Service Unavailable");
        assert!(matches!(result, Err(ParseError::MalformedXml { .. })));
    }
}
