use crate::types::{StackError, StackResult};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Root `<product>` element of a Sentinel-1 annotation file.
///
/// Only the header is read here; burst timing and footprint come from the
/// toolkit's parameter files.
#[derive(Debug, Deserialize)]
pub struct AnnotationRoot {
    #[serde(rename = "adsHeader")]
    pub ads_header: AdsHeader,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdsHeader {
    #[serde(rename = "missionId")]
    pub mission_id: String,
    #[serde(rename = "productType")]
    pub product_type: String,
    #[serde(rename = "polarisation")]
    pub polarisation: String,
    #[serde(rename = "mode")]
    pub mode: String,
    #[serde(rename = "swath")]
    pub swath: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "stopTime")]
    pub stop_time: String,
}

/// Parser for Sentinel-1 annotation XML headers
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse the annotation header from XML content
    pub fn parse_header(xml_content: &str) -> StackResult<AdsHeader> {
        from_str::<AnnotationRoot>(xml_content)
            .map(|root| root.ads_header)
            .map_err(|e| StackError::XmlParsing(format!("Failed to parse annotation XML: {}", e)))
    }

    /// Read an annotation file and check it belongs to the expected sub-swath and polarization
    pub fn verify<P: AsRef<Path>>(path: P, iw: usize, polarization: &str) -> StackResult<AdsHeader> {
        let path = path.as_ref();
        let xml_content = fs::read_to_string(path)?;
        let header = Self::parse_header(&xml_content)?;

        let expected_swath = format!("IW{}", iw);
        if !header.swath.eq_ignore_ascii_case(&expected_swath) {
            return Err(StackError::InvalidFormat(format!(
                "annotation '{}' describes swath {} instead of {}",
                path.display(),
                header.swath,
                expected_swath
            )));
        }

        if !header.polarisation.eq_ignore_ascii_case(polarization) {
            return Err(StackError::InvalidFormat(format!(
                "annotation '{}' has polarisation {} instead of {}",
                path.display(),
                header.polarisation,
                polarization.to_uppercase()
            )));
        }

        log::debug!(
            "Annotation {} verified: {} {} {} {}",
            path.display(),
            header.mission_id,
            header.mode,
            header.swath,
            header.polarisation
        );

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product>
  <adsHeader>
    <missionId>S1A</missionId>
    <productType>SLC</productType>
    <polarisation>VV</polarisation>
    <mode>IW</mode>
    <swath>IW2</swath>
    <startTime>2016-07-02T16:33:43.394683</startTime>
    <stopTime>2016-07-02T16:34:08.356043</stopTime>
    <absoluteOrbitNumber>11972</absoluteOrbitNumber>
    <missionDataTakeId>75619</missionDataTakeId>
    <imageNumber>005</imageNumber>
  </adsHeader>
  <qualityInformation>
    <productQualityIndex>0.0</productQualityIndex>
  </qualityInformation>
</product>"#;

    #[test]
    fn test_annotation_header_parsing() {
        let header = AnnotationParser::parse_header(SAMPLE_XML).unwrap();

        assert_eq!(header.mission_id, "S1A");
        assert_eq!(header.swath, "IW2");
        assert_eq!(header.polarisation, "VV");
    }

    #[test]
    fn test_verify_rejects_wrong_swath() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("s1a-iw2-slc-vv.xml");
        std::fs::write(&path, SAMPLE_XML).unwrap();

        assert!(AnnotationParser::verify(&path, 2, "vv").is_ok());
        assert!(matches!(
            AnnotationParser::verify(&path, 1, "vv"),
            Err(StackError::InvalidFormat(_))
        ));
        assert!(AnnotationParser::verify(&path, 2, "vh").is_err());
    }

    #[test]
    fn test_malformed_annotation() {
        assert!(matches!(
            AnnotationParser::parse_header("<product><swathTiming/></product>"),
            Err(StackError::XmlParsing(_))
        ));
    }
}
