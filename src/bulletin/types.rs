// Classified, fully typed event records. Produced by the classifier,
// consumed once by the formatter.

#[derive(Debug, Clone, PartialEq)]
pub struct EewWarning {
    pub title: String,
    pub serial: u32,
    pub hypocenter: String,
    pub max_intensity: String,
    pub magnitude: f64,
    pub depth_km: i32,
    pub origin_time: String,
    pub is_sea: bool,
    pub is_assumption: bool,
    pub is_cancel: bool,
    pub is_final: bool,
    pub is_warn: bool,
    pub is_training: bool,
    pub original_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hypocenter {
    pub name: String,
    pub magnitude: f64,
    pub depth_km: i32,
}

// One observation station row of a ScalePrompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedIntensity {
    pub prefecture: String,
    pub address: String,
    pub scale: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityPrompt {
    pub time: String,
    pub max_scale: i32,
    pub tsunami: String,
    pub points: Vec<ObservedIntensity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityDetail {
    pub time: String,
    pub max_scale: i32,
    pub tsunami: String,
    pub hypocenter: Hypocenter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HypocenterReport {
    pub time: String,
    pub tsunami: String,
    pub hypocenter: Hypocenter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignQuake {
    pub time: String,
    pub tsunami: String,
    pub location: String,
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedEvent {
    EewWarning(EewWarning),
    IntensityPrompt(IntensityPrompt),
    IntensityDetail(IntensityDetail),
    HypocenterOnly(HypocenterReport),
    ForeignQuake(ForeignQuake),
    // Recognized feed, category we do not render
    Unhandled { category: String },
}

impl ClassifiedEvent {
    pub fn kind(&self) -> &str {
        match self {
            ClassifiedEvent::EewWarning(_) => "EEWWarning",
            ClassifiedEvent::IntensityPrompt(_) => "ScalePrompt",
            ClassifiedEvent::IntensityDetail(_) => "DetailScale",
            ClassifiedEvent::HypocenterOnly(_) => "Destination",
            ClassifiedEvent::ForeignQuake(_) => "Foreign",
            ClassifiedEvent::Unhandled { category } => category,
        }
    }
}
