//! Form payload shared by the HTML form and the JSON API

use serde::{de, Deserialize, Deserializer};
use validator::Validate;

use crash_risk_core::constants::DEFAULT_THRESHOLD;
use crash_risk_core::FormInput;

/// Raw submission, range-checked before a record is assembled
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(default)]
pub struct PredictForm {
    #[validate(range(min = 0.01, max = 0.99, message = "must be within [0.01, 0.99]"))]
    pub threshold: f64,

    #[serde(rename = "AGE_IM")]
    #[validate(range(min = 0, max = 120, message = "must be within [0, 120]"))]
    pub age_im: i64,
    #[serde(rename = "SEX_IM")]
    pub sex_im: i64,
    #[serde(rename = "ALCOHOL")]
    pub alcohol: i64,
    #[serde(rename = "DRUGS")]
    pub drugs: i64,
    #[serde(rename = "HOUR_acc")]
    #[validate(range(min = 0, max = 23, message = "must be within [0, 23]"))]
    pub hour_acc: i64,
    #[serde(rename = "MONTH_acc")]
    #[validate(range(min = 1, max = 12, message = "must be within [1, 12]"))]
    pub month_acc: i64,
    #[serde(rename = "NUMOCCS")]
    #[validate(range(min = 0, max = 20, message = "must be within [0, 20]"))]
    pub numoccs: i64,
    #[serde(rename = "DAY_WEEK")]
    pub day_week: i64,
    #[serde(rename = "LGTCON_IM")]
    pub lgtcon_im: i64,
    #[serde(rename = "WEATHR_IM")]
    pub weathr_im: i64,
    #[serde(rename = "REGION")]
    pub region: i64,
    #[serde(rename = "REL_ROAD")]
    pub rel_road: i64,
    #[serde(rename = "RELJCT2_IM")]
    pub reljct2_im: i64,
    #[serde(rename = "REST_USE")]
    pub rest_use: i64,
    #[serde(rename = "SPEEDREL")]
    pub speedrel: i64,

    pub body_typ_group: i64,
    #[serde(deserialize_with = "checkbox")]
    pub use_exact_body_typ: bool,
    #[serde(deserialize_with = "blank_as_none")]
    #[validate(range(min = 0, max = 999, message = "must be within [0, 999]"))]
    pub exact_body_typ: Option<i64>,
}

impl Default for PredictForm {
    fn default() -> Self {
        Self::from_input(&FormInput::default(), DEFAULT_THRESHOLD)
    }
}

impl PredictForm {
    pub fn from_input(input: &FormInput, threshold: f64) -> Self {
        Self {
            threshold,
            age_im: input.age_im,
            sex_im: input.sex_im,
            alcohol: input.alcohol,
            drugs: input.drugs,
            hour_acc: input.hour_acc,
            month_acc: input.month_acc,
            numoccs: input.numoccs,
            day_week: input.day_week,
            lgtcon_im: input.lgtcon_im,
            weathr_im: input.weathr_im,
            region: input.region,
            rel_road: input.rel_road,
            reljct2_im: input.reljct2_im,
            rest_use: input.rest_use,
            speedrel: input.speedrel,
            body_typ_group: input.body_typ_group,
            use_exact_body_typ: input.use_exact_body_typ,
            exact_body_typ: input.exact_body_typ,
        }
    }

    pub fn to_input(&self) -> FormInput {
        FormInput {
            age_im: self.age_im,
            sex_im: self.sex_im,
            alcohol: self.alcohol,
            drugs: self.drugs,
            hour_acc: self.hour_acc,
            month_acc: self.month_acc,
            numoccs: self.numoccs,
            day_week: self.day_week,
            lgtcon_im: self.lgtcon_im,
            weathr_im: self.weathr_im,
            region: self.region,
            rel_road: self.rel_road,
            reljct2_im: self.reljct2_im,
            rest_use: self.rest_use,
            speedrel: self.speedrel,
            body_typ_group: self.body_typ_group,
            use_exact_body_typ: self.use_exact_body_typ,
            exact_body_typ: self.exact_body_typ,
        }
    }
}

/// HTML checkboxes send "on" when ticked and nothing otherwise
fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct CheckboxVisitor;

    impl<'de> de::Visitor<'de> for CheckboxVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or a checkbox value")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" | "yes" => Ok(true),
                "" | "off" | "false" | "0" | "no" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    deserializer.deserialize_any(CheckboxVisitor)
}

/// Empty number inputs arrive as ""
fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    struct BlankVisitor;

    impl<'de> de::Visitor<'de> for BlankVisitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an integer, a blank string or null")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i64::try_from(v)
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let v = v.trim();
            if v.is_empty() {
                return Ok(None);
            }
            v.parse()
                .map(Some)
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(BlankVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_checkbox_and_blank() {
        let form: PredictForm =
            serde_urlencoded::from_str("AGE_IM=44&use_exact_body_typ=on&exact_body_typ=&threshold=0.3").unwrap();
        assert_eq!(form.age_im, 44);
        assert!(form.use_exact_body_typ);
        assert_eq!(form.exact_body_typ, None);
        assert_eq!(form.threshold, 0.3);
        // untouched fields keep their defaults
        assert_eq!(form.month_acc, 6);
    }

    #[test]
    fn test_json_payload() {
        let form: PredictForm = serde_json::from_str(
            r#"{"BODY_TYP": 5, "use_exact_body_typ": true, "exact_body_typ": 5, "NUMOCCS": 3}"#,
        )
        .unwrap();
        assert!(form.use_exact_body_typ);
        assert_eq!(form.exact_body_typ, Some(5));
        assert_eq!(form.to_input().body_typ(), 5);
        assert_eq!(form.numoccs, 3);
    }

    #[test]
    fn test_range_validation() {
        let mut form = PredictForm::default();
        assert!(form.validate().is_ok());

        form.hour_acc = 24;
        form.exact_body_typ = Some(1000);
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("hour_acc"));
        assert!(fields.contains_key("exact_body_typ"));
    }

    #[test]
    fn test_round_trip_with_core_input() {
        let input = FormInput::default();
        assert_eq!(PredictForm::from_input(&input, 0.25).to_input(), input);
    }
}
