//! HTML rendering for the summary and error emails.
//!
//! Markup is composed with a `quick-xml` writer: every piece of user data
//! (site names, dates, error text) goes through exactly one text or
//! attribute escape, and highlighting is applied as element structure
//! rather than by splicing tags into already-escaped text.

use anyhow::Result;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use site_tracker_core::digest::SiteDigest;

/// Inline style wrapped around dates that just became available.
pub const HIGHLIGHT_STYLE: &str = "background-color: #ffff00; font-weight: bold";

pub const SUMMARY_SUBJECT_PREFIX: &str = "New availability at";
pub const ERROR_SUBJECT: &str = "Site tracker run failed";

const CELL_STYLE: &str = "padding: 2px 12px; border-bottom: 1px solid #dddddd";

type HtmlWriter = Writer<Vec<u8>>;

/// Subject line for a summary covering `digest`.
pub fn summary_subject(digest: &[SiteDigest]) -> String {
    format!("{} {} site(s)", SUMMARY_SUBJECT_PREFIX, digest.len())
}

/// Render the summary: one section per site, one table row per date.
pub fn render_summary(digest: &[SiteDigest]) -> Result<String> {
    let mut w = Writer::new(Vec::new());
    open(&mut w, "html", &[])?;
    open(&mut w, "body", &[])?;

    element(&mut w, "h2", &[], "New availability")?;
    if digest.is_empty() {
        element(&mut w, "p", &[], "No upcoming dates are currently available.")?;
    } else {
        open(&mut w, "p", &[])?;
        text(&mut w, "Dates marked ")?;
        element(&mut w, "span", &[("style", HIGHLIGHT_STYLE)], "like this")?;
        text(&mut w, " became available since the last check.")?;
        close(&mut w, "p")?;
    }

    for site in digest {
        element(&mut w, "h3", &[], &site.display_name)?;
        open(&mut w, "table", &[("style", "border-collapse: collapse")])?;
        open(&mut w, "tr", &[])?;
        element(&mut w, "th", &[("style", CELL_STYLE)], "Date")?;
        element(&mut w, "th", &[("style", CELL_STYLE)], "Day")?;
        close(&mut w, "tr")?;

        for day in &site.dates {
            let date = day.date.format("%Y-%m-%d").to_string();
            let weekday = day.date.format("%A").to_string();

            open(&mut w, "tr", &[])?;
            open(&mut w, "td", &[("style", CELL_STYLE)])?;
            if day.newly_available {
                element(&mut w, "span", &[("style", HIGHLIGHT_STYLE)], &date)?;
            } else {
                text(&mut w, &date)?;
            }
            close(&mut w, "td")?;
            element(&mut w, "td", &[("style", CELL_STYLE)], &weekday)?;
            close(&mut w, "tr")?;
        }

        close(&mut w, "table")?;
    }

    close(&mut w, "body")?;
    close(&mut w, "html")?;
    Ok(String::from_utf8(w.into_inner())?)
}

/// Render the failure email around a formatted error trace.
pub fn render_error(stage: &str, diagnostic: &str) -> Result<String> {
    let mut w = Writer::new(Vec::new());
    open(&mut w, "html", &[])?;
    open(&mut w, "body", &[])?;
    element(&mut w, "h2", &[], ERROR_SUBJECT)?;
    element(&mut w, "p", &[], &format!("The run failed during: {}", stage))?;
    element(&mut w, "pre", &[], diagnostic)?;
    close(&mut w, "body")?;
    close(&mut w, "html")?;
    Ok(String::from_utf8(w.into_inner())?)
}

fn open(w: &mut HtmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut start = BytesStart::new(tag);
    for &attr in attrs {
        start.push_attribute(attr);
    }
    w.write_event(Event::Start(start))?;
    Ok(())
}

fn close(w: &mut HtmlWriter, tag: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Escapes only `<`, `>` and `&`; `&apos;` is not an HTML 4 entity.
fn text(w: &mut HtmlWriter, content: &str) -> Result<()> {
    w.write_event(Event::Text(BytesText::from_escaped(partial_escape(content))))?;
    Ok(())
}

fn element(w: &mut HtmlWriter, tag: &str, attrs: &[(&str, &str)], content: &str) -> Result<()> {
    open(w, tag, attrs)?;
    text(w, content)?;
    close(w, tag)
}
