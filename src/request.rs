//! Batch requests: the JSON document a client sends, and what it turns into.
//!
//! A [`BatchRequest`] is validated against the [`Roster`] and expanded into a
//! [`Plan`]: the TV actions to run and, optionally, one full-length
//! [`Request`] for the orchestrator.

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DefaultOnNull, serde_as};

use crate::errors::Error;
use crate::roster::Roster;
use crate::tv::TvAction;
use crate::types::{ColorToken, DeviceKind, Priority};

type Result<T> = std::result::Result<T, Error>;

/// One color per device, applied together at one priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    tokens: Vec<ColorToken>,
    priority: Priority,
    bypass_quiet_hours: bool,
}

impl Request {
    pub fn new(tokens: Vec<ColorToken>, priority: Priority) -> Self {
        Request {
            tokens,
            priority,
            bypass_quiet_hours: false,
        }
    }

    /// The same token for `count` devices.
    pub fn uniform(count: usize, token: ColorToken, priority: Priority) -> Self {
        Self::new(vec![token; count], priority)
    }

    /// Apply the request even inside the quiet hours.
    pub fn bypassing_quiet_hours(mut self) -> Self {
        self.bypass_quiet_hours = true;
        self
    }

    pub fn tokens(&self) -> &[ColorToken] {
        &self.tokens
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn bypasses_quiet_hours(&self) -> bool {
        self.bypass_quiet_hours
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// What a batch request asks the server to do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub tv: Vec<TvAction>,
    pub request: Option<Request>,
}

/// A client batch request, as sent over the control plane.
///
/// Unknown fields are ignored and `null` means "not set". `playbulb` and
/// `milight` accept either a list or a comma-separated string.
#[serde_as]
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRequest {
    #[serde_as(as = "DefaultOnNull")]
    pub hexvalues: Vec<String>,
    #[serde(deserialize_with = "kind_values")]
    pub playbulb: Option<Vec<String>>,
    #[serde(deserialize_with = "kind_values")]
    pub milight: Option<Vec<String>>,
    #[serde_as(as = "DefaultOnNull")]
    pub on: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub off: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub toggle: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub notime: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub tvon: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub tvoff: bool,
    #[serde_as(as = "DefaultOnNull")]
    pub tvrestart: bool,
    pub priority: Option<i64>,
    pub group: Option<String>,
    pub subgroup: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KindValues {
    List(Vec<String>),
    Csv(String),
}

fn kind_values<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<KindValues>::deserialize(deserializer)?.map(|values| match values {
            KindValues::List(list) => list,
            KindValues::Csv(csv) => csv
                .replace(['"', '\''], "")
                .split(',')
                .map(|v| v.trim().to_string())
                .collect(),
        }),
    )
}

impl BatchRequest {
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| Error::malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::JsonDump)
    }

    /// A request carrying one explicit value per device.
    pub fn colors<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        BatchRequest {
            hexvalues: values.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn has_kind_values(&self) -> bool {
        self.playbulb.is_some() || self.milight.is_some()
    }

    fn has_modifier(&self) -> bool {
        self.notime
            || self.off
            || self.on
            || self.toggle
            || self.tvon
            || self.tvoff
            || self.tvrestart
            || self.has_kind_values()
    }

    /// Validate the request and expand it into per-device tokens.
    ///
    /// `current` holds the on-wire color of every device and is only read
    /// for `toggle`.
    pub fn plan(&self, roster: &Roster, current: &[String]) -> Result<Plan> {
        let count = roster.len();

        if !self.hexvalues.is_empty() && self.has_kind_values() {
            return Err(Error::invalid_request(
                "hexvalues cannot be combined with playbulb or milight values",
            ));
        }
        if self.tvon && self.tvoff {
            return Err(Error::invalid_request("tvon and tvoff are exclusive"));
        }
        if self.hexvalues.len() != count && (!self.has_modifier() || !self.hexvalues.is_empty()) {
            return Err(Error::invalid_request(format!(
                "got {} color values, {} expected",
                self.hexvalues.len(),
                count
            )));
        }
        let priority = Priority::create(self.priority.unwrap_or(1)).ok_or_else(|| {
            Error::invalid_request(format!(
                "priority {} out of range",
                self.priority.unwrap_or_default()
            ))
        })?;

        if self.tvon {
            return Ok(Plan {
                tv: vec![TvAction::On],
                request: None,
            });
        }
        let mut tv = Vec::new();
        if self.tvoff {
            tv.push(TvAction::Off);
        }
        if self.tvrestart {
            tv.push(TvAction::Restart);
            return Ok(Plan { tv, request: None });
        }

        let Some(mut tokens) = self.tokens(roster, current)? else {
            return Ok(Plan { tv, request: None });
        };
        if let Some(group) = &self.group {
            roster.mask_group(&mut tokens, group, self.subgroup.as_deref());
        }

        let mut request = Request::new(tokens, priority);
        if self.notime || self.off {
            request = request.bypassing_quiet_hours();
        }
        Ok(Plan {
            tv,
            request: Some(request),
        })
    }

    // Later sources override earlier ones: explicit values, kind-scoped
    // values, then off, on and toggle.
    fn tokens(&self, roster: &Roster, current: &[String]) -> Result<Option<Vec<ColorToken>>> {
        let count = roster.len();
        let mut tokens = None;

        if !self.hexvalues.is_empty() {
            tokens = Some(self.hexvalues.iter().map(|v| ColorToken::from(v.as_str())).collect());
        } else {
            for (kind, values) in [
                (DeviceKind::Playbulb, &self.playbulb),
                (DeviceKind::Milight, &self.milight),
            ] {
                if let Some(values) = values {
                    let merged = tokens.take().unwrap_or_else(|| vec![ColorToken::Skip; count]);
                    tokens = Some(scatter(roster, kind, values, merged)?);
                }
            }
        }

        if self.off {
            tokens = Some(vec![ColorToken::Off; count]);
        }
        if self.on {
            tokens = Some(vec![ColorToken::On; count]);
        }
        if self.toggle {
            tokens = Some(toggled(roster, current));
        }
        Ok(tokens)
    }
}

/// Place one value per device of `kind` at that device's index.
fn scatter(
    roster: &Roster,
    kind: DeviceKind,
    values: &[String],
    mut tokens: Vec<ColorToken>,
) -> Result<Vec<ColorToken>> {
    let indices = roster.indices_of(kind);
    if indices.is_empty() {
        return Err(Error::invalid_request(format!("no {kind} device configured")));
    }
    if values.len() != indices.len() {
        return Err(Error::invalid_request(format!(
            "got {} {} values, {} expected",
            values.len(),
            kind,
            indices.len()
        )));
    }
    for (&index, value) in indices.iter().zip(values) {
        tokens[index] = ColorToken::from(value.as_str());
    }
    Ok(tokens)
}

/// All off if any device is lit, all on otherwise.
fn toggled(roster: &Roster, current: &[String]) -> Vec<ColorToken> {
    let any_lit = current
        .iter()
        .enumerate()
        .any(|(index, color)| roster.off_value(index).is_some_and(|off| color != off));
    let token = if any_lit { ColorToken::Off } else { ColorToken::On };
    vec![token; roster.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Member;

    fn member(kind: DeviceKind, group: &str, subgroup: Option<&str>) -> Member {
        Member {
            kind,
            group: group.to_string(),
            subgroup: subgroup.map(String::from),
        }
    }

    // milight, playbulb, milight, playbulb
    fn roster() -> Roster {
        Roster::new(vec![
            member(DeviceKind::Milight, "passage", None),
            member(DeviceKind::Playbulb, "salon", Some("luminaire")),
            member(DeviceKind::Milight, "salon", None),
            member(DeviceKind::Playbulb, "salon", Some("plafond")),
        ])
    }

    fn all_off() -> Vec<String> {
        vec!["0".into(), "00000000".into(), "0".into(), "00000000".into()]
    }

    fn tokens(values: &[&str]) -> Vec<ColorToken> {
        values.iter().map(|v| ColorToken::from(*v)).collect()
    }

    fn plan(json: &str) -> Result<Plan> {
        BatchRequest::from_json(json)?.plan(&roster(), &all_off())
    }

    #[test]
    fn test_parse_client_document() {
        let batch = BatchRequest::from_json(
            r#"{"hexvalues": [], "playbulb": "'ff000000', '00ff0000'", "milight": null,
                "on": false, "off": false, "toggle": null, "priority": null,
                "server": "localhost", "journal": true}"#,
        )
        .unwrap();
        assert_eq!(
            batch.playbulb,
            Some(vec!["ff000000".to_string(), "00ff0000".to_string()])
        );
        assert_eq!(batch.milight, None);
        assert!(!batch.toggle);
        assert_eq!(batch.priority, None);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            BatchRequest::from_json("{not json"),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_explicit_values() {
        let explicit =
            plan(r#"{"hexvalues": ["1", "-1", "0", "ff00ff00"], "priority": 2}"#).unwrap();
        assert!(explicit.tv.is_empty());
        let request = explicit.request.unwrap();
        assert_eq!(request.tokens(), tokens(&["1", "-1", "0", "ff00ff00"]).as_slice());
        assert_eq!(request.priority().value(), 2);
        assert!(!request.bypasses_quiet_hours());
    }

    #[test]
    fn test_wrong_value_count() {
        assert!(matches!(
            plan(r#"{"hexvalues": ["1", "1"]}"#),
            Err(Error::InvalidRequest(_))
        ));
        // Even with a modifier, a non-empty list must match.
        assert!(matches!(
            plan(r#"{"hexvalues": ["1"], "on": true}"#),
            Err(Error::InvalidRequest(_))
        ));
        // Nothing at all.
        assert!(matches!(plan("{}"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_priority_range() {
        assert!(matches!(
            plan(r#"{"on": true, "priority": 4}"#),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            plan(r#"{"on": true, "priority": 0}"#),
            Err(Error::InvalidRequest(_))
        ));
        let request = plan(r#"{"on": true, "priority": 3}"#).unwrap().request.unwrap();
        assert!(request.priority().is_transient());
    }

    #[test]
    fn test_kind_scoped_values() {
        let scoped = plan(r#"{"playbulb": ["ff000000", "0"]}"#).unwrap();
        assert_eq!(
            scoped.request.unwrap().tokens(),
            tokens(&["-1", "ff000000", "-1", "0"]).as_slice()
        );

        let both = plan(r#"{"playbulb": "1,0", "milight": "120, 1"}"#).unwrap();
        assert_eq!(
            both.request.unwrap().tokens(),
            tokens(&["120", "1", "1", "0"]).as_slice()
        );
    }

    #[test]
    fn test_kind_scoped_errors() {
        assert!(matches!(
            plan(r#"{"playbulb": ["1"]}"#),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            plan(r#"{"hexvalues": ["1", "1", "1", "1"], "milight": ["1", "1"]}"#),
            Err(Error::InvalidRequest(_))
        ));

        let only_milight = Roster::new(vec![member(DeviceKind::Milight, "salon", None)]);
        let batch = BatchRequest::from_json(r#"{"playbulb": []}"#).unwrap();
        assert!(matches!(
            batch.plan(&only_milight, &["0".to_string()]),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_on_off_and_group() {
        let on = plan(r#"{"on": true, "group": "salon"}"#).unwrap();
        assert_eq!(
            on.request.unwrap().tokens(),
            tokens(&["-1", "1", "1", "1"]).as_slice()
        );

        let off = plan(r#"{"off": true, "group": "salon", "subgroup": "plafond"}"#)
            .unwrap()
            .request
            .unwrap();
        assert_eq!(off.tokens(), tokens(&["-1", "-1", "-1", "0"]).as_slice());
        assert!(off.bypasses_quiet_hours());
    }

    #[test]
    fn test_toggle() {
        let batch = BatchRequest {
            toggle: true,
            ..Default::default()
        };
        let roster = roster();

        let request = batch.plan(&roster, &all_off()).unwrap().request.unwrap();
        assert_eq!(request.tokens(), vec![ColorToken::On; 4].as_slice());

        let mut current = all_off();
        current[1] = "ff000000".to_string();
        let request = batch.plan(&roster, &current).unwrap().request.unwrap();
        assert_eq!(request.tokens(), vec![ColorToken::Off; 4].as_slice());
    }

    #[test]
    fn test_tv_actions() {
        let on = plan(r#"{"tvon": true, "on": true}"#).unwrap();
        assert_eq!(on.tv, vec![TvAction::On]);
        assert!(on.request.is_none());

        let off = plan(r#"{"tvoff": true, "off": true}"#).unwrap();
        assert_eq!(off.tv, vec![TvAction::Off]);
        assert!(off.request.is_some());

        let restart = plan(r#"{"tvrestart": true, "on": true}"#).unwrap();
        assert_eq!(restart.tv, vec![TvAction::Restart]);
        assert!(restart.request.is_none());

        assert!(matches!(
            plan(r#"{"tvon": true, "tvoff": true}"#),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_notime_alone_changes_nothing() {
        let nothing = plan(r#"{"notime": true}"#).unwrap();
        assert_eq!(nothing, Plan::default());
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let json = BatchRequest::colors(["1", "0"]).to_json().unwrap();
        assert!(json.contains(r#""hexvalues":["1","0"]"#));
        assert!(!json.contains("priority"));
        assert!(!json.contains("playbulb"));
    }
}
