//! Test fixtures: representative XML payloads from the solar-terrestrial feed.
//!
//! These mirror the document served by:
//!   https://www.hamqsl.com/solarxml.php
//!
//! Feed shape:
//!   <solar>
//!     <solardata>
//!       <source url="...">N0NBH</source>
//!       <updated>, <solarflux>, <aindex>, <kindex>, ... - one reading each, as text
//!       <calculatedconditions>
//!         <band name="80m-40m" time="day">Poor</band> ...
//!       <calculatedvhfconditions>
//!         <phenomenon name="vhf-aurora" location="northern_hemi">Band Closed</phenomenon> ...
//!
//! Note: every reading is text, even the numeric ones ("150", "No Report").
//! The parser must not coerce them.

/// Full feed as published, with whitespace-padded values and an element
/// the parser does not know about (`<unknownfield>`).
#[cfg(test)]
pub(crate) fn fixture_full_feed_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<solar>
	<solardata>
		<source url="http://www.hamqsl.com/solar.html">N0NBH</source>
		<updated> 16 Oct 2026 1200 GMT</updated>
		<solarflux>150</solarflux>
		<aindex> 7</aindex>
		<kindex> 2</kindex>
		<kindexnt>No Report</kindexnt>
		<xray>B7.4</xray>
		<sunspots>112</sunspots>
		<heliumline> 128.4</heliumline>
		<protonflux>217</protonflux>
		<electonflux>1520</electonflux>
		<aurora> 1</aurora>
		<normalization>1.99</normalization>
		<latdegree>67.5</latdegree>
		<solarwind>403.6</solarwind>
		<magneticfield> -1.3</magneticfield>
		<unknownfield>ignored</unknownfield>
		<calculatedconditions>
			<band name="80m-40m" time="day">Poor</band>
			<band name="30m-20m" time="day">Good</band>
			<band name="17m-15m" time="day">Good</band>
			<band name="12m-10m" time="day">Fair</band>
			<band name="80m-40m" time="night">Fair</band>
			<band name="30m-20m" time="night">Good</band>
			<band name="17m-15m" time="night">Fair</band>
			<band name="12m-10m" time="night">Poor</band>
		</calculatedconditions>
		<calculatedvhfconditions>
			<phenomenon name="vhf-aurora" location="northern_hemi">Band Closed</phenomenon>
			<phenomenon name="E-Skip" location="europe">Band Closed</phenomenon>
			<phenomenon name="E-Skip" location="north_america">Band Closed</phenomenon>
			<phenomenon name="E-Skip" location="europe_6m">50MHz ES</phenomenon>
			<phenomenon name="E-Skip" location="europe_4m">Band Closed</phenomenon>
		</calculatedvhfconditions>
		<geomagfield>QUIET</geomagfield>
		<signalnoise>S0-S1</signalnoise>
		<fof2>7.25</fof2>
		<muffactor>2.88</muffactor>
		<muf>20.88</muf>
	</solardata>
</solar>"#
}

/// Same bands as the full feed but 80m-40m (day) reported twice; the
/// second entry is the one lookups must keep.
#[cfg(test)]
pub(crate) fn fixture_duplicate_band_xml() -> &'static str {
    r#"<solar><solardata>
  <solarflux>148</solarflux>
  <calculatedconditions>
    <band name="80m-40m" time="day">Poor</band>
    <band name="30m-20m" time="day">Good</band>
    <band name="80m-40m" time="Day">Good</band>
  </calculatedconditions>
  <calculatedvhfconditions>
    <phenomenon name="E-Skip" location="europe">Band Closed</phenomenon>
    <phenomenon name="E-Skip" location="europe">50MHz ES</phenomenon>
  </calculatedvhfconditions>
</solardata></solar>"#
}

/// Root element with nothing in it.
#[cfg(test)]
pub(crate) fn fixture_empty_root_xml() -> &'static str {
    r#"<?xml version="1.0"?><solar></solar>"#
}

/// Truncated mid-document, as when a connection drops.
#[cfg(test)]
pub(crate) fn fixture_truncated_xml() -> &'static str {
    r#"<solar><solardata><solarflux>150</solarflux><calculatedconditions><band name="80m-40m" time="day">Poor"#
}

/// Feed declared as ISO-8859-1 carrying a Latin-1 degree sign (0xB0), which
/// is not valid UTF-8 on its own.
#[cfg(test)]
pub(crate) fn fixture_latin1_feed_bytes() -> Vec<u8> {
    let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-1"?>
<solar><solardata><latdegree>67.5"#
        .to_vec();
    bytes.push(0xB0);
    bytes.extend_from_slice(
        br#"</latdegree><calculatedvhfconditions><phenomenon name="vhf-aurora" location="northern_hemi">Band Closed</phenomenon></calculatedvhfconditions></solardata></solar>"#,
    );
    bytes
}
