// Source: wss://ws-api.wolfx.jp/jma_eew (JMA EEW JSON)
// Field names are the feed's own, including the "Magunitude" spelling.
#[derive(Debug, serde::Deserialize)]
pub struct EewMessage {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Serial")]
    pub serial: u32,
    #[serde(rename = "Hypocenter")]
    pub hypocenter: String,
    #[serde(rename = "MaxIntensity")]
    pub max_intensity: String, // already a display string, e.g. "5+"
    #[serde(rename = "Magunitude")]
    pub magnitude: f64,
    #[serde(rename = "Depth")]
    pub depth: i32, // km
    #[serde(rename = "OriginTime")]
    pub origin_time: String, // "YYYY/MM/DD hh:mm:ss"
    #[serde(rename = "isSea")]
    pub is_sea: bool,
    #[serde(rename = "isAssumption")]
    pub is_assumption: bool,
    #[serde(rename = "isCancel")]
    pub is_cancel: bool,
    #[serde(rename = "isFinal")]
    pub is_final: bool,
    #[serde(rename = "isWarn")]
    pub is_warn: bool,
    #[serde(rename = "isTraining")]
    pub is_training: bool,
    #[serde(rename = "OriginalText")]
    pub original_text: String,
}

// Source: https://api.p2pquake.net/v2/ws (code 551 = JMAQuake)
// Only the header is read first; the body shape depends on issue.type.
#[derive(Debug, serde::Deserialize)]
pub struct P2pEnvelope {
    pub issue: P2pIssue,
}

#[derive(Debug, serde::Deserialize)]
pub struct P2pIssue {
    #[serde(rename = "type")]
    pub kind: String, // "ScalePrompt" | "DetailScale" | "Destination" | "Foreign" | ...
}

#[derive(Debug, serde::Deserialize)]
pub struct ScalePromptMessage {
    pub earthquake: PromptQuake,
    pub points: Vec<P2pPoint>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptQuake {
    pub time: String,
    pub max_scale: i32,
    pub domestic_tsunami: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct P2pPoint {
    pub pref: String,
    pub addr: String,
    pub scale: i32,
}

#[derive(Debug, serde::Deserialize)]
pub struct DetailScaleMessage {
    pub earthquake: DetailQuake,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuake {
    pub time: String,
    pub max_scale: i32,
    pub domestic_tsunami: String,
    pub hypocenter: P2pHypocenter,
}

#[derive(Debug, serde::Deserialize)]
pub struct DestinationMessage {
    pub earthquake: LocatedQuake,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatedQuake {
    pub time: String,
    pub domestic_tsunami: String,
    pub hypocenter: P2pHypocenter,
}

#[derive(Debug, serde::Deserialize)]
pub struct P2pHypocenter {
    pub name: String,
    pub magnitude: f64, // -1 when not yet determined
    pub depth: i32,     // km, 0 = very shallow, -1 = unknown
}

#[derive(Debug, serde::Deserialize)]
pub struct ForeignMessage {
    pub earthquake: ForeignQuakeBody,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignQuakeBody {
    pub time: String,
    pub domestic_tsunami: String,
    pub hypocenter: ForeignHypocenter,
}

#[derive(Debug, serde::Deserialize)]
pub struct ForeignHypocenter {
    pub name: String,
    pub magnitude: f64,
    // depth is often absent for foreign events; we ignore it
}
