//! VAST XML generation and the tracking/macro injection applied to
//! video winners before the response goes out.

use crate::core::vast::model::{
    InlineAd, TrackingEvent, VastAd, VastDocument, WrapperAd, format_duration,
};
use anyhow::{Error, anyhow};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

/// The standard quartile/interaction events we pin onto every winner
pub const STANDARD_EVENTS: &[&str] = &[
    "start",
    "firstQuartile",
    "midpoint",
    "thirdQuartile",
    "complete",
    "mute",
    "pause",
];

/// Replaces the auction price macros in a url or markup blob. The
/// price lands percent-encoding-safe: it is digits and a dot.
pub fn substitute_price_macros(raw: &str, clearing_price: f64) -> String {
    let price = format!("{:.2}", clearing_price);

    raw.replace("${AUCTION_PRICE}", &price)
        .replace("%%AUCTION_PRICE%%", &price)
}

fn write_text_el<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_cdata_el<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    content: &str,
) -> Result<(), Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::CData(BytesCData::new(content)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_tracking_events<W: std::io::Write>(
    writer: &mut Writer<W>,
    tracking: &[TrackingEvent],
) -> Result<(), Error> {
    if tracking.is_empty() {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new("TrackingEvents")))?;

    for t in tracking {
        let mut el = BytesStart::new("Tracking");
        el.push_attribute(("event", t.event.as_str()));
        writer.write_event(Event::Start(el))?;
        writer.write_event(Event::CData(BytesCData::new(&t.url)))?;
        writer.write_event(Event::End(BytesEnd::new("Tracking")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("TrackingEvents")))?;
    Ok(())
}

fn write_inline<W: std::io::Write>(writer: &mut Writer<W>, ad: &InlineAd) -> Result<(), Error> {
    writer.write_event(Event::Start(BytesStart::new("InLine")))?;

    write_text_el(writer, "AdSystem", &ad.ad_system)?;
    write_text_el(writer, "AdTitle", &ad.ad_title)?;

    for url in &ad.error_urls {
        write_cdata_el(writer, "Error", url)?;
    }
    for url in &ad.impressions {
        write_cdata_el(writer, "Impression", url)?;
    }

    writer.write_event(Event::Start(BytesStart::new("Creatives")))?;
    writer.write_event(Event::Start(BytesStart::new("Creative")))?;
    writer.write_event(Event::Start(BytesStart::new("Linear")))?;

    write_text_el(writer, "Duration", &format_duration(ad.duration_secs))?;
    write_tracking_events(writer, &ad.tracking)?;

    if ad.click_through.is_some() || !ad.click_tracking.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("VideoClicks")))?;

        if let Some(click) = &ad.click_through {
            write_cdata_el(writer, "ClickThrough", click)?;
        }
        for url in &ad.click_tracking {
            write_cdata_el(writer, "ClickTracking", url)?;
        }

        writer.write_event(Event::End(BytesEnd::new("VideoClicks")))?;
    }

    writer.write_event(Event::Start(BytesStart::new("MediaFiles")))?;
    for media in &ad.media_files {
        let mut el = BytesStart::new("MediaFile");
        el.push_attribute(("delivery", "progressive"));
        el.push_attribute(("type", media.mime.as_str()));
        el.push_attribute(("width", media.width.to_string().as_str()));
        el.push_attribute(("height", media.height.to_string().as_str()));
        writer.write_event(Event::Start(el))?;
        writer.write_event(Event::CData(BytesCData::new(&media.url)))?;
        writer.write_event(Event::End(BytesEnd::new("MediaFile")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("MediaFiles")))?;

    writer.write_event(Event::End(BytesEnd::new("Linear")))?;
    writer.write_event(Event::End(BytesEnd::new("Creative")))?;
    writer.write_event(Event::End(BytesEnd::new("Creatives")))?;
    writer.write_event(Event::End(BytesEnd::new("InLine")))?;
    Ok(())
}

fn write_wrapper<W: std::io::Write>(writer: &mut Writer<W>, ad: &WrapperAd) -> Result<(), Error> {
    writer.write_event(Event::Start(BytesStart::new("Wrapper")))?;

    write_text_el(writer, "AdSystem", &ad.ad_system)?;
    write_cdata_el(writer, "VASTAdTagURI", &ad.vast_ad_tag_uri)?;

    for url in &ad.error_urls {
        write_cdata_el(writer, "Error", url)?;
    }
    for url in &ad.impressions {
        write_cdata_el(writer, "Impression", url)?;
    }

    if !ad.tracking.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("Creatives")))?;
        writer.write_event(Event::Start(BytesStart::new("Creative")))?;
        writer.write_event(Event::Start(BytesStart::new("Linear")))?;
        write_tracking_events(writer, &ad.tracking)?;
        writer.write_event(Event::End(BytesEnd::new("Linear")))?;
        writer.write_event(Event::End(BytesEnd::new("Creative")))?;
        writer.write_event(Event::End(BytesEnd::new("Creatives")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Wrapper")))?;
    Ok(())
}

/// Serializes a document back to XML
pub fn generate(doc: &VastDocument) -> Result<String, Error> {
    let mut writer = Writer::new(Vec::new());

    let mut vast = BytesStart::new("VAST");
    vast.push_attribute(("version", doc.version.as_str()));
    writer.write_event(Event::Start(vast))?;

    let mut ad_el = BytesStart::new("Ad");
    if !doc.ad_id.is_empty() {
        ad_el.push_attribute(("id", doc.ad_id.as_str()));
    }
    writer.write_event(Event::Start(ad_el))?;

    match &doc.ad {
        VastAd::Inline(inline) => write_inline(&mut writer, inline)?,
        VastAd::Wrapper(wrapper) => write_wrapper(&mut writer, wrapper)?,
    }

    writer.write_event(Event::End(BytesEnd::new("Ad")))?;
    writer.write_event(Event::End(BytesEnd::new("VAST")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| anyhow!("Generated non-utf8 xml: {}", e))
}

/// Injects our impression pixel, error pixel, and the standard
/// tracking event set into a winner's document, substituting the
/// clearing price into every url we touch.
pub fn inject_tracking(
    doc: &mut VastDocument,
    impression_url: &str,
    error_url: &str,
    event_url_for: impl Fn(&str) -> String,
    clearing_price: f64,
) {
    doc.ad
        .impressions_mut()
        .push(substitute_price_macros(impression_url, clearing_price));

    doc.ad
        .error_urls_mut()
        .push(substitute_price_macros(error_url, clearing_price));

    let tracking = doc.ad.tracking_mut();
    for event in STANDARD_EVENTS {
        tracking.push(TrackingEvent {
            event: event.to_string(),
            url: substitute_price_macros(&event_url_for(event), clearing_price),
        });
    }
}
