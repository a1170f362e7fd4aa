//! XML persistence format for an [`SdkSet`]
//!
//! ```xml
//! <sdks defaultSdk="NAME">
//!   <sdk name="NAME" location="ABS_PATH"/>
//! </sdks>
//! ```
//!
//! There is no version field: the decoder only checks the root tag name
//! (case-insensitively) and ignores attributes and elements it does not know.

use crate::sdk::{SdkFactory, SdkSet};
use crate::types::{BoxError, Result, SdkError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use tracing::debug;

const ROOT_TAG: &str = "sdks";
const SDK_TAG: &str = "sdk";
const DEFAULT_ATTR: &str = "defaultSdk";
const NAME_ATTR: &str = "name";
const LOCATION_ATTR: &str = "location";

pub fn encode(sdks: &SdkSet) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;

    let mut root = BytesStart::new(ROOT_TAG);
    if let Some(default) = sdks.default_sdk() {
        root.push_attribute((DEFAULT_ATTR, default.name()));
    }
    writer.write_event(Event::Start(root)).map_err(write_error)?;

    for sdk in sdks {
        let location = sdk.install_path().to_str().ok_or_else(|| {
            SdkError::malformed(format!(
                "install path of '{}' is not valid UTF-8: {}",
                sdk.name(),
                sdk.install_path().display()
            ))
        })?;

        let mut element = BytesStart::new(SDK_TAG);
        element.push_attribute((NAME_ATTR, sdk.name()));
        element.push_attribute((LOCATION_ATTR, location));
        writer.write_event(Event::Empty(element)).map_err(write_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
        .map_err(write_error)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| SdkError::serialization("encoded registry is not UTF-8", e))
}

pub fn decode(blob: &str, factory: &dyn SdkFactory) -> Result<SdkSet> {
    let mut reader = Reader::from_str(blob);
    reader.config_mut().trim_text(true);

    let mut sdks = SdkSet::new();
    let mut default_name: Option<String> = None;
    let mut seen_root = false;
    let mut depth = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(SdkError::serialization(
                    format!("malformed SDK registry near byte {}", reader.buffer_position()),
                    e,
                ))
            }
        };

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));

                if !seen_root {
                    if !tag_is(element, ROOT_TAG) {
                        return Err(SdkError::malformed(format!(
                            "unexpected root element <{}>, expected <{}>",
                            String::from_utf8_lossy(element.name().as_ref()),
                            ROOT_TAG
                        )));
                    }
                    seen_root = true;
                    default_name = attribute(element, DEFAULT_ATTR)?;
                } else if depth == 1 && tag_is(element, SDK_TAG) {
                    let name = required_attribute(element, NAME_ATTR)?;
                    let location = required_attribute(element, LOCATION_ATTR)?;
                    sdks.add(factory.new_instance(&name, Path::new(&location)));
                } else {
                    debug!(
                        "Ignoring element <{}> in SDK registry",
                        String::from_utf8_lossy(element.name().as_ref())
                    );
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(SdkError::malformed(format!("missing <{}> root element", ROOT_TAG)));
    }
    if depth != 0 {
        return Err(SdkError::malformed("unexpected end of SDK registry document"));
    }

    if let Some(name) = default_name {
        match sdks.find_by_name(&name).cloned() {
            Some(default) => sdks.set_default(&default),
            None => debug!("Recorded default SDK '{}' is not registered", name),
        }
    }

    Ok(sdks)
}

fn write_error(e: impl Into<BoxError>) -> SdkError {
    SdkError::serialization("failed to write SDK registry", e)
}

fn tag_is(element: &BytesStart, tag: &str) -> bool {
    element.name().as_ref().eq_ignore_ascii_case(tag.as_bytes())
}

fn attribute(element: &BytesStart, key: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SdkError::serialization("malformed attribute", e))?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(key.as_bytes()) {
            let value = attr
                .unescape_value()
                .map_err(|e| SdkError::serialization("malformed attribute value", e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(element: &BytesStart, key: &str) -> Result<String> {
    attribute(element, key)?
        .ok_or_else(|| SdkError::malformed(format!("<{}> is missing the '{}' attribute", SDK_TAG, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdkLayout;
    use crate::sdk::entry::tests::{sdk, test_layout};
    use crate::sdk::LayoutSdkFactory;

    fn factory() -> LayoutSdkFactory {
        LayoutSdkFactory::new(test_layout())
    }

    fn sample() -> SdkSet {
        let mut set: SdkSet = [sdk("GWT 2.7", "/kits/gwt-2.7"), sdk("GWT 2.8", "/kits/gwt-2.8")]
            .into_iter()
            .collect();
        set.set_default(&sdk("GWT 2.8", "/kits/gwt-2.8"));
        set
    }

    #[test]
    fn test_round_trip() {
        let set = sample();
        let decoded = decode(&encode(&set).unwrap(), &factory()).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(decoded.default_name(), Some("GWT 2.8"));
    }

    #[test]
    fn test_round_trip_empty_and_escaped() {
        let empty = SdkSet::new();
        assert_eq!(decode(&encode(&empty).unwrap(), &factory()).unwrap(), empty);

        let odd: SdkSet = [sdk("a<b> & \"c\"", "/kits/it's here")].into_iter().collect();
        assert_eq!(decode(&encode(&odd).unwrap(), &factory()).unwrap(), odd);
    }

    #[test]
    fn test_encode_shape() {
        let xml = encode(&sample()).unwrap();
        assert!(xml.contains(r#"<sdks defaultSdk="GWT 2.8">"#));
        assert!(xml.contains(r#"<sdk name="GWT 2.7" location="/kits/gwt-2.7"/>"#));
        assert!(xml.find("GWT 2.7\" location").unwrap() < xml.find("GWT 2.8\" location").unwrap());
    }

    #[test]
    fn test_decode_is_lenient() {
        let xml = r#"<?xml version="1.0"?>
            <SDKS defaultSdk="B" generator="other-tool">
              <!-- hand edited -->
              <sdk name="A" location="/a" checksum="abc"/>
              <note>ignored</note>
              <Sdk name="B" location="/b"></Sdk>
            </SDKS>"#;
        let set = decode(xml, &factory()).unwrap();
        let names: Vec<&str> = set.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(set.default_sdk().unwrap().name(), "B");
    }

    #[test]
    fn test_stale_default_is_left_unset() {
        let xml = r#"<sdks defaultSdk="gone"><sdk name="A" location="/a"/><sdk name="B" location="/b"/></sdks>"#;
        let set = decode(xml, &factory()).unwrap();
        assert_eq!(set.default_name(), None);
        assert_eq!(set.default_sdk().unwrap().name(), "A");
    }

    #[test]
    fn test_decode_uses_factory() {
        let layout = std::sync::Arc::new(SdkLayout {
            name: "other".to_string(),
            ..test_layout()
        });
        let factory = move |name: &str, path: &Path| {
            crate::sdk::Sdk::new(name.to_uppercase(), path, std::sync::Arc::clone(&layout))
        };
        let set = decode(r#"<sdks><sdk name="a" location="/a"/></sdks>"#, &factory).unwrap();
        let a = set.find_by_name("A").unwrap();
        assert_eq!(a.layout().name, "other");
    }

    #[test]
    fn test_decode_failures() {
        let factory = factory();
        for bad in [
            "",
            "not xml at all",
            "<registry/>",
            r#"<sdks><sdk name="A"/></sdks>"#,
            r#"<sdks><sdk name="A" location="/a"></sdks>"#,
            r#"<sdks><sdk name="A" location="/a"/>"#,
        ] {
            let err = decode(bad, &factory);
            assert!(
                matches!(err, Err(SdkError::Serialization { .. })),
                "expected failure for {:?}",
                bad
            );
        }
    }
}
