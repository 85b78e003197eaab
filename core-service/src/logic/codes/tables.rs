//! Code Dictionaries (CRSS-style)
//!
//! Static code -> label tables, one per categorical field.
//! Labels are display text only; the model always receives the integer code.

use serde::Serialize;

/// Immutable code -> label mapping for one field
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CodeTable {
    /// Form field the codes feed; the record column for every table but the vehicle group
    pub column: &'static str,
    /// Human-readable control title
    pub title: &'static str,
    /// Code pre-selected on the form
    pub default_code: i64,
    /// (code, label) pairs, codes unique
    pub entries: &'static [(i64, &'static str)],
}

impl CodeTable {
    /// Label for a code, if the code belongs to this table
    pub fn label(&self, code: i64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }

    /// Code for an exact label
    pub fn code_of(&self, label: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(code, _)| *code)
    }

    pub fn contains(&self, code: i64) -> bool {
        self.label(code).is_some()
    }

    /// Entries ordered by ascending code
    pub fn sorted_entries(&self) -> Vec<(i64, &'static str)> {
        let mut items = self.entries.to_vec();
        items.sort_by_key(|(code, _)| *code);
        items
    }
}

pub const SEX_IM: CodeTable = CodeTable {
    column: "SEX_IM",
    title: "Sex (SEX_IM)",
    default_code: 1,
    entries: &[
        (1, "Male"),
        (2, "Female"),
        (8, "Not reported"),
        (9, "Unknown / Reported as unknown"),
    ],
};

pub const ALCOHOL: CodeTable = CodeTable {
    column: "ALCOHOL",
    title: "Alcohol involved (ALCOHOL)",
    default_code: 2,
    entries: &[
        (1, "Alcohol involved"),
        (2, "No alcohol involved"),
        (8, "No applicable person"),
        (9, "Unknown"),
    ],
};

pub const DRUGS: CodeTable = CodeTable {
    column: "DRUGS",
    title: "Drugs involved (DRUGS)",
    default_code: 0,
    entries: &[
        (0, "No (not involved)"),
        (1, "Yes (involved)"),
        (8, "Not reported"),
        (9, "Unknown / Reported as unknown"),
    ],
};

pub const SPEEDREL: CodeTable = CodeTable {
    column: "SPEEDREL",
    title: "Speed-related (SPEEDREL)",
    default_code: 0,
    entries: &[
        (0, "No"),
        (2, "Yes, racing"),
        (3, "Yes, exceeded speed limit"),
        (4, "Yes, too fast for conditions"),
        (5, "Yes, specifics unknown"),
        (8, "No driver present / Unknown if driver present"),
        (9, "Unknown / Reported as unknown"),
    ],
};

pub const DAY_WEEK: CodeTable = CodeTable {
    column: "DAY_WEEK",
    title: "Day of week (DAY_WEEK)",
    default_code: 3,
    entries: &[
        (1, "Sunday"),
        (2, "Monday"),
        (3, "Tuesday"),
        (4, "Wednesday"),
        (5, "Thursday"),
        (6, "Friday"),
        (7, "Saturday"),
    ],
};

pub const LGTCON_IM: CodeTable = CodeTable {
    column: "LGTCON_IM",
    title: "Light condition (LGTCON_IM)",
    default_code: 1,
    entries: &[
        (1, "Daylight"),
        (2, "Dark (not lighted)"),
        (3, "Dark (lighted)"),
        (4, "Dawn"),
        (5, "Dusk"),
        (6, "Other"),
        (8, "Not reported"),
        (9, "Unknown"),
    ],
};

pub const WEATHR_IM: CodeTable = CodeTable {
    column: "WEATHR_IM",
    title: "Weather (WEATHR_IM)",
    default_code: 1,
    entries: &[
        (1, "Clear"),
        (2, "Rain"),
        (3, "Sleet / Hail"),
        (4, "Snow"),
        (5, "Fog / Smog / Smoke"),
        (6, "Severe crosswinds"),
        (7, "Blowing sand/soil/dirt"),
        (8, "Other"),
        (10, "Cloudy"),
        (98, "Not reported"),
        (99, "Unknown / Reported as unknown"),
    ],
};

pub const REGION: CodeTable = CodeTable {
    column: "REGION",
    title: "Region (REGION)",
    default_code: 1,
    entries: &[
        (1, "Northeast"),
        (2, "Midwest"),
        (3, "South"),
        (4, "West"),
        (8, "Not reported"),
        (9, "Unknown"),
    ],
};

pub const REL_ROAD: CodeTable = CodeTable {
    column: "REL_ROAD",
    title: "Relation to roadway (REL_ROAD)",
    default_code: 1,
    entries: &[
        (1, "On roadway"),
        (2, "On shoulder"),
        (3, "On median"),
        (4, "On roadside"),
        (5, "Outside trafficway"),
        (6, "Off roadway – location unknown"),
        (7, "In parking lane/zone"),
        (8, "Gore"),
        (10, "Separator"),
        (11, "Continuous left turn lane"),
        (12, "Pedestrian refuge island / Traffic island"),
        (98, "Not reported"),
        (99, "Unknown / Reported as unknown"),
    ],
};

pub const RELJCT2_IM: CodeTable = CodeTable {
    column: "RELJCT2_IM",
    title: "Relation to junction (RELJCT2_IM)",
    default_code: 0,
    entries: &[
        (0, "Non-junction"),
        (1, "Intersection"),
        (2, "Intersection-related"),
        (3, "Driveway / Alley access"),
        (4, "Ramp-related"),
        (5, "Other junction"),
        (8, "Not reported"),
        (9, "Unknown"),
    ],
};

pub const REST_USE: CodeTable = CodeTable {
    column: "REST_USE",
    title: "Restraint use (REST_USE)",
    default_code: 3,
    entries: &[
        (0, "Not applicable"),
        (1, "Shoulder belt only used"),
        (2, "Lap belt only used"),
        (3, "Shoulder and lap belt used"),
        (6, "Racing-style harness used"),
        (7, "None used"),
        (8, "Restraint used – type unknown"),
        (10, "Child restraint – forward facing"),
        (11, "Child restraint – rear facing"),
        (12, "Booster seat"),
        (16, "Helmet, other than DOT-compliant motorcycle helmet"),
        (17, "No helmet"),
        (19, "Helmet, unknown DOT-compliance"),
        (20, "None used / Not applicable"),
        (96, "Not a motor vehicle occupant"),
        (97, "Other"),
        (98, "Not reported"),
        (99, "Unknown / Reported as unknown"),
    ],
};

/// Vehicle type groups; each code is the group's representative BODY_TYP.
/// Keyed by its form field so an exact BODY_TYP never picks up a group label.
pub const BODY_TYP_GROUP: CodeTable = CodeTable {
    column: "body_typ_group",
    title: "Vehicle type group (based on BODY_TYP ranges)",
    default_code: 1,
    entries: &[
        (1, "Passenger Cars (01–11, 17)"),
        (14, "Light Trucks & Vans (14–16, 19–22, 28–41, 45–49)"),
        (50, "Buses (50–59)"),
        (60, "Large Trucks (60–64, 66, 67, 71, 72, 78)"),
        (80, "Motorcycles (80–89)"),
        (98, "Other / Unknown Vehicles"),
        (99, "Unknown (98/99)"),
    ],
};

/// Every categorical dictionary, in form order
pub const ALL_TABLES: [&CodeTable; 12] = [
    &SEX_IM,
    &ALCOHOL,
    &DRUGS,
    &DAY_WEEK,
    &LGTCON_IM,
    &WEATHR_IM,
    &REGION,
    &REL_ROAD,
    &RELJCT2_IM,
    &SPEEDREL,
    &REST_USE,
    &BODY_TYP_GROUP,
];

/// Dictionary backing a record column, if the column is categorical
pub fn table_for(column: &str) -> Option<&'static CodeTable> {
    ALL_TABLES.iter().copied().find(|t| t.column == column)
}
