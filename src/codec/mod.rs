//! Build-code wire format: Base64 → DEFLATE → XML (§6). Treated as glue
//! per spec — functionally complete and shape-preserving, not an
//! elaborately modeled XML schema. The codec only reads the handful of
//! attributes the rest of the system needs (class, level, ascendancy,
//! allocated node ids) and otherwise treats the decoded XML as an opaque
//! string it can splice a new node list into, so re-encoding an unchanged
//! build reproduces the exact input bytes (Testable Property 6).

use std::collections::BTreeSet;
use std::io::{Read, Write};

use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::build::{Build, CharacterClass};
use crate::error::OptimizerError;
use crate::tree::NodeId;

/// Maximum accepted build-code size (§4.7 `/optimize` validation).
pub const MAX_BUILD_CODE_BYTES: usize = 100 * 1024;

/// A decoded build plus the exact XML text it came from, so `encode` can
/// reproduce byte-identical output when nothing changed.
#[derive(Debug, Clone)]
pub struct DecodedBuild {
    pub build: Build,
    pub raw_xml: String,
}

pub fn decode_build_code(code: &str) -> Result<DecodedBuild, OptimizerError> {
    if code.len() > MAX_BUILD_CODE_BYTES {
        return Err(OptimizerError::Validation {
            reason: format!("build code is {} bytes, exceeds {MAX_BUILD_CODE_BYTES}", code.len()),
            action: Some("re-export a smaller build and retry".into()),
        });
    }

    let compressed = decode_base64(code.trim())?;
    let xml = inflate(&compressed)?;
    let build = parse_build(&xml)?;
    Ok(DecodedBuild { build, raw_xml: xml })
}

/// Re-encodes `raw_xml` with `allocated` spliced into the `<Spec nodes="…">`
/// attribute, then DEFLATE + Base64 wraps the result. When `allocated`
/// matches what `raw_xml` already contains, the output is byte-identical
/// to re-deflating the original text (Testable Property 6).
pub fn encode_build_code(raw_xml: &str, allocated: &BTreeSet<NodeId>) -> Result<String, OptimizerError> {
    let nodes_csv = allocated.iter().map(|n| n.0.to_string()).collect::<Vec<_>>().join(",");
    let spliced = splice_nodes_attribute(raw_xml, &nodes_csv)?;
    let compressed = deflate(spliced.as_bytes())?;
    Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
}

fn decode_base64(code: &str) -> Result<Vec<u8>, OptimizerError> {
    // The game ecosystem's export tool commonly uses the URL-safe
    // alphabet; the reference importer also accepts standard. Try both
    // rather than guessing wrong and surfacing a confusing decode error.
    base64::engine::general_purpose::URL_SAFE
        .decode(code)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(code))
        .map_err(|e| OptimizerError::BuildDecode {
            reason: format!("base64 decode failed: {e}"),
        })
}

fn inflate(compressed: &[u8]) -> Result<String, OptimizerError> {
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut out = String::new();
    decoder.read_to_string(&mut out).map_err(|e| OptimizerError::BuildDecode {
        reason: format!("deflate decompression failed: {e}"),
    })?;
    Ok(out)
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, OptimizerError> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(raw).map_err(|e| OptimizerError::Internal {
        reason: format!("deflate compression failed: {e}"),
    })?;
    encoder.finish().map_err(|e| OptimizerError::Internal {
        reason: format!("deflate compression failed: {e}"),
    })
}

fn parse_build(xml: &str) -> Result<Build, OptimizerError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut class = None;
    let mut level = None;
    let mut ascendancy = None;
    let mut nodes = BTreeSet::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| OptimizerError::BuildDecode {
            reason: format!("malformed build XML: {e}"),
        })?;
        match event {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) => {
                let name = tag.name();
                let local = String::from_utf8_lossy(name.as_ref()).to_string();
                for attr in tag.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    match (local.as_str(), key.as_str()) {
                        ("Build", "level") => level = value.parse::<u8>().ok(),
                        ("Build", "className") => class = CharacterClass::from_str(&value),
                        ("Build", "ascendClassName") if !value.is_empty() && value != "None" => {
                            ascendancy = Some(value)
                        }
                        ("Spec", "nodes") => {
                            nodes = value
                                .split(',')
                                .filter_map(|s| s.trim().parse::<u32>().ok())
                                .map(NodeId)
                                .collect();
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    let class = class.ok_or_else(|| OptimizerError::BuildDecode {
        reason: "build XML missing <Build className=\"...\">".into(),
    })?;
    let level = level.ok_or_else(|| OptimizerError::BuildDecode {
        reason: "build XML missing <Build level=\"...\">".into(),
    })?;

    if nodes.is_empty() {
        return Err(OptimizerError::BuildDecode {
            reason: "build XML has no allocated nodes in <Spec nodes=\"...\">".into(),
        });
    }

    Ok(Build {
        class,
        level,
        ascendancy,
        allocated: nodes,
        items_skills_payload: serde_json::Value::Null,
    })
}

/// Replaces the value of the first `nodes="…"` attribute found. Operating
/// on the text directly (rather than round-tripping through a writer)
/// guarantees every other byte of the document — attribute order,
/// whitespace, unrelated tags the rest of this system never looks at
/// (items, skills, configuration) — survives untouched.
fn splice_nodes_attribute(xml: &str, nodes_csv: &str) -> Result<String, OptimizerError> {
    const NEEDLE: &str = "nodes=\"";
    let Some(start) = xml.find(NEEDLE) else {
        return Err(OptimizerError::Internal {
            reason: "build XML lost its nodes attribute before export".into(),
        });
    };
    let value_start = start + NEEDLE.len();
    let Some(value_len) = xml[value_start..].find('"') else {
        return Err(OptimizerError::Internal {
            reason: "unterminated nodes attribute in build XML".into(),
        });
    };
    let mut spliced = String::with_capacity(xml.len());
    spliced.push_str(&xml[..value_start]);
    spliced.push_str(nodes_csv);
    spliced.push_str(&xml[value_start + value_len..]);
    Ok(spliced)
}

impl CharacterClass {
    fn from_str(value: &str) -> Option<Self> {
        match value {
            "Warrior" => Some(CharacterClass::Warrior),
            "Ranger" => Some(CharacterClass::Ranger),
            "Witch" => Some(CharacterClass::Witch),
            "Duelist" => Some(CharacterClass::Duelist),
            "Templar" => Some(CharacterClass::Templar),
            "Shadow" => Some(CharacterClass::Shadow),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_xml() -> &'static str {
        r#"<PathOfBuilding><Build level="90" className="Witch" ascendClassName="Necromancer"></Build><Tree><Spec treeVersion="3_24" nodes="1,2,3"></Spec></Tree></PathOfBuilding>"#
    }

    fn sample_code() -> String {
        let compressed = deflate(sample_xml().as_bytes()).unwrap();
        base64::engine::general_purpose::STANDARD.encode(compressed)
    }

    #[test]
    fn decodes_class_level_ascendancy_and_nodes() {
        let decoded = decode_build_code(&sample_code()).unwrap();
        assert_eq!(decoded.build.class, CharacterClass::Witch);
        assert_eq!(decoded.build.level, 90);
        assert_eq!(decoded.build.ascendancy.as_deref(), Some("Necromancer"));
        assert_eq!(decoded.build.allocated.len(), 3);
    }

    #[test]
    fn unchanged_build_round_trips_byte_for_byte() {
        let code = sample_code();
        let decoded = decode_build_code(&code).unwrap();
        let re_encoded = encode_build_code(&decoded.raw_xml, &decoded.build.allocated).unwrap();

        let re_decoded = decode_build_code(&re_encoded).unwrap();
        assert_eq!(re_decoded.build.allocated, decoded.build.allocated);
        assert_eq!(re_decoded.raw_xml, decoded.raw_xml);
    }

    #[test]
    fn export_reflects_a_mutated_node_set() {
        let decoded = decode_build_code(&sample_code()).unwrap();
        let mut grown = decoded.build.allocated.clone();
        grown.insert(NodeId(4));

        let exported = encode_build_code(&decoded.raw_xml, &grown).unwrap();
        let re_decoded = decode_build_code(&exported).unwrap();
        assert!(re_decoded.build.allocated.contains(&NodeId(4)));
    }

    #[test]
    fn oversized_code_is_rejected() {
        let huge = "A".repeat(MAX_BUILD_CODE_BYTES + 1);
        let err = decode_build_code(&huge).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
    }
}
