//! Category labels for displaying clinical values.

use serde::Serialize;
use std::fmt;

macro_rules! labelled {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled!(LdlCategory {
    Optimal => "Optimal",
    NearOptimal => "Near optimal",
    BorderlineHigh => "Borderline high",
    High => "High",
    VeryHigh => "Very high",
});

labelled!(Hba1cCategory {
    Normal => "Normal",
    Prediabetes => "Prediabetes",
    Diabetes => "Diabetes",
});

labelled!(LvefCategory {
    Normal => "Normal",
    MildlyReduced => "Mildly reduced",
    ModeratelyReduced => "Moderately reduced",
    SeverelyReduced => "Severely reduced",
});

labelled!(BloodPressureCategory {
    Normal => "Normal",
    Elevated => "Elevated",
    Stage1 => "Stage 1 hypertension",
    Stage2 => "Stage 2 hypertension",
    Crisis => "Hypertensive crisis",
});

labelled!(BmiCategory {
    Underweight => "Underweight",
    Normal => "Normal weight",
    Overweight => "Overweight",
    ObesityClass1 => "Obesity class I",
    ObesityClass2 => "Obesity class II",
    ObesityClass3 => "Obesity class III",
});

/// LDL cholesterol, mg/dL.
pub fn classify_ldl(ldl: f64) -> LdlCategory {
    match ldl {
        v if v < 70.0 => LdlCategory::Optimal,
        v if v < 100.0 => LdlCategory::NearOptimal,
        v if v < 130.0 => LdlCategory::BorderlineHigh,
        v if v < 160.0 => LdlCategory::High,
        _ => LdlCategory::VeryHigh,
    }
}

/// HbA1c, percent.
pub fn classify_hba1c(hba1c: f64) -> Hba1cCategory {
    match hba1c {
        v if v < 5.7 => Hba1cCategory::Normal,
        v if v < 6.5 => Hba1cCategory::Prediabetes,
        _ => Hba1cCategory::Diabetes,
    }
}

/// Left ventricular ejection fraction, percent.
pub fn classify_lvef(lvef: f64) -> LvefCategory {
    match lvef {
        v if v >= 55.0 => LvefCategory::Normal,
        v if v >= 40.0 => LvefCategory::MildlyReduced,
        v if v >= 30.0 => LvefCategory::ModeratelyReduced,
        _ => LvefCategory::SeverelyReduced,
    }
}

/// Systolic/diastolic pressure in mmHg. The higher of the two bands wins.
pub fn classify_blood_pressure(systolic: f64, diastolic: f64) -> BloodPressureCategory {
    if systolic < 120.0 && diastolic < 80.0 {
        BloodPressureCategory::Normal
    } else if systolic < 130.0 && diastolic < 80.0 {
        BloodPressureCategory::Elevated
    } else if systolic < 140.0 && diastolic < 90.0 {
        BloodPressureCategory::Stage1
    } else if systolic < 180.0 && diastolic < 120.0 {
        BloodPressureCategory::Stage2
    } else {
        BloodPressureCategory::Crisis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bmi {
    /// kg/m², rounded to one decimal.
    pub value: f64,
    pub category: BmiCategory,
}

/// Body-mass index from weight (kg) and height (cm). `None` when either is missing or zero.
pub fn bmi(weight_kg: Option<f64>, height_cm: Option<f64>) -> Option<Bmi> {
    let weight = weight_kg.filter(|w| *w > 0.0)?;
    let height_m = height_cm.filter(|h| *h > 0.0)? / 100.0;
    let value = weight / (height_m * height_m);

    let category = match value {
        v if v < 18.5 => BmiCategory::Underweight,
        v if v < 25.0 => BmiCategory::Normal,
        v if v < 30.0 => BmiCategory::Overweight,
        v if v < 35.0 => BmiCategory::ObesityClass1,
        v if v < 40.0 => BmiCategory::ObesityClass2,
        _ => BmiCategory::ObesityClass3,
    };

    Some(Bmi {
        value: crate::population::round_one_decimal(value),
        category,
    })
}

pub fn format_ldl(ldl: Option<f64>) -> String {
    match ldl {
        Some(v) => format!("{} mg/dL ({})", v, classify_ldl(v)),
        None => "N/A".into(),
    }
}

pub fn format_hba1c(hba1c: Option<f64>) -> String {
    match hba1c {
        Some(v) => format!("{}% ({})", v, classify_hba1c(v)),
        None => "N/A".into(),
    }
}

pub fn format_lvef(lvef: Option<f64>) -> String {
    match lvef {
        Some(v) => format!("{}% ({})", v, classify_lvef(v)),
        None => "N/A".into(),
    }
}

pub fn format_blood_pressure(systolic: Option<f64>, diastolic: Option<f64>) -> String {
    match (systolic, diastolic) {
        (Some(s), Some(d)) => format!("{}/{} mmHg ({})", s, d, classify_blood_pressure(s, d)),
        _ => "N/A".into(),
    }
}
