// Renders a ClassifiedEvent to the final bulletin text.
// Pure: same event in, same text out. Line order and wording are a contract
// with downstream consumers, do not reflow.

use chrono::NaiveDateTime;
use itertools::Itertools;

use super::tables::{depth_label, location_label, magnitude_label, scale_label, tsunami_sentence};
use super::types::{
    ClassifiedEvent, EewWarning, ForeignQuake, HypocenterReport, IntensityDetail, IntensityPrompt,
};
use crate::error::FormatError;

const FEED_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
// Events are always near-real-time, so headlines carry day/hour/minute only.
const HEADLINE_TIME_FORMAT: &str = "%d日 %H時%M分";
const EEW_TIME_FORMAT: &str = "%H時%M分%S秒";

/// `Ok(None)` for `Unhandled`: there is nothing to render.
pub fn render(event: &ClassifiedEvent) -> Result<Option<String>, FormatError> {
    let text = match event {
        ClassifiedEvent::EewWarning(w) => render_eew(w)?,
        ClassifiedEvent::IntensityPrompt(p) => render_prompt(p)?,
        ClassifiedEvent::IntensityDetail(d) => render_detail(d)?,
        ClassifiedEvent::HypocenterOnly(h) => render_hypocenter(h)?,
        ClassifiedEvent::ForeignQuake(f) => render_foreign(f)?,
        ClassifiedEvent::Unhandled { .. } => return Ok(None),
    };
    Ok(Some(text))
}

pub fn parse_feed_time(raw: &str) -> Result<NaiveDateTime, FormatError> {
    NaiveDateTime::parse_from_str(raw, FEED_TIME_FORMAT).map_err(|source| FormatError::Timestamp {
        raw: raw.to_string(),
        source,
    })
}

fn headline_time(raw: &str) -> Result<String, FormatError> {
    Ok(parse_feed_time(raw)?.format(HEADLINE_TIME_FORMAT).to_string())
}

fn render_eew(w: &EewWarning) -> Result<String, FormatError> {
    let origin = parse_feed_time(&w.origin_time)?.format(EEW_TIME_FORMAT).to_string();

    // cancel, final, training, assumption; always in this order
    let qualifiers = [
        (w.is_cancel, "(取消)"),
        (w.is_final, "(最終報)"),
        (w.is_training, "(訓練)"),
        (w.is_assumption, "(仮定震源)"),
    ];
    let mut title = format!("{} 第{}報", w.title, w.serial);
    for (_, label) in qualifiers.iter().filter(|(set, _)| *set) {
        title.push(' ');
        title.push_str(label);
    }

    Ok([
        title,
        String::new(),
        format!("震源地: {}", location_label(&w.hypocenter)),
        format!("推定最大震度: {}", w.max_intensity),
        format!("マグニチュード: {}", magnitude_label(w.magnitude)),
        format!("深さ: {}", depth_label(w.depth_km)),
        format!("発生時刻: {}", origin),
        format!("海域地震: {}", if w.is_sea { "はい" } else { "いいえ" }),
        format!("警報: {}", if w.is_warn { "発表中" } else { "発表なし" }),
        String::new(),
        format!("気象庁原電文: {}", w.original_text),
    ]
    .join("\n"))
}

fn render_prompt(p: &IntensityPrompt) -> Result<String, FormatError> {
    let when = headline_time(&p.time)?;
    let points = p
        .points
        .iter()
        .map(|pt| format!("{} {}: {}", pt.prefecture, pt.address, scale_label(pt.scale)))
        .join("\n");

    let mut lines = vec![
        "震度速報".to_string(),
        String::new(),
        format!("{}頃", when),
        format!("最大震度{}を観測する地震が発生しました", scale_label(p.max_scale)),
        tsunami_sentence(&p.tsunami).to_string(),
        String::new(),
        "震度情報:".to_string(),
    ];
    if !points.is_empty() {
        lines.push(points);
    }
    Ok(lines.join("\n"))
}

fn render_detail(d: &IntensityDetail) -> Result<String, FormatError> {
    let when = headline_time(&d.time)?;
    let place = location_label(&d.hypocenter.name);
    Ok([
        "震源・震度に関する情報".to_string(),
        String::new(),
        format!("{}頃", when),
        format!("{}で最大震度{}を観測する地震が発生しました", place, scale_label(d.max_scale)),
        tsunami_sentence(&d.tsunami).to_string(),
        String::new(),
        format!("震源地: {}", place),
        format!("マグニチュード: {}", magnitude_label(d.hypocenter.magnitude)),
        format!("深さ: {}", depth_label(d.hypocenter.depth_km)),
    ]
    .join("\n"))
}

fn render_hypocenter(h: &HypocenterReport) -> Result<String, FormatError> {
    let when = headline_time(&h.time)?;
    let place = location_label(&h.hypocenter.name);
    Ok([
        "震源に関する情報".to_string(),
        String::new(),
        format!("{}頃、{}で地震がありました。", when, place),
        tsunami_sentence(&h.tsunami).to_string(),
        String::new(),
        format!("震源地: {}", place),
        format!("マグニチュード: {}", magnitude_label(h.hypocenter.magnitude)),
        format!("深さ: {}", depth_label(h.hypocenter.depth_km)),
    ]
    .join("\n"))
}

fn render_foreign(f: &ForeignQuake) -> Result<String, FormatError> {
    let when = headline_time(&f.time)?;
    let place = location_label(&f.location);
    Ok([
        "遠地地震に関する情報".to_string(),
        String::new(),
        format!("{}頃、{}で地震がありました。", when, place),
        tsunami_sentence(&f.tsunami).to_string(),
        String::new(),
        format!("震源地: {}", place),
        format!("マグニチュード: {}", magnitude_label(f.magnitude)),
    ]
    .join("\n"))
}
