//! Region id to place name lookup.

use std::collections::HashMap;

use lazy_static::lazy_static;

use super::model::WorldPoint;

/// Several regions can share one place name.
const PLACES: &[(&str, &[i32])] = &[
    ("Al Kharid", &[13105, 13106]),
    ("Ardougne East", &[10291, 10547]),
    ("Ardougne West", &[10035]),
    ("Barbarian Outpost", &[10039]),
    ("Barbarian Village", &[12341]),
    ("Burthorpe / Taverley", &[11573, 11574]),
    ("Camelot", &[11062]),
    ("Canifis", &[13878, 12747]),
    ("Digsite", &[13365]),
    ("Draynor Manor", &[12340]),
    ("Draynor Village", &[12338]),
    ("Edgeville", &[12342, 11835]),
    ("Entrana", &[11316]),
    ("Falador", &[11827, 11828]),
    ("Falador East", &[12084]),
    ("Ferox Enclave", &[13362]),
    ("Grand Exchange", &[12598]),
    ("Hosidius", &[14642]),
    ("Karamja", &[11057, 11059, 11310]),
    ("Keldagrim", &[11423]),
    ("Lumbridge", &[12850]),
    ("Lumbridge Swamp", &[12593, 12849, 12851]),
    ("Low Wilderness", &[12345, 12589]),
    ("Piscarilius", &[14997]),
    ("Port Phasmatys", &[14646]),
    ("Port Sarim", &[12081, 12082]),
    ("Prifddinas", &[13151, 13152]),
    ("Rellekka", &[10553, 10554, 10555, 11050]),
    ("Seers' Village", &[10806]),
    ("Shayzien", &[14745]),
    ("South Varlamore", &[6189, 6445, 6701]),
    ("Tree Gnome Village", &[10033]),
    ("Varrock", &[12853, 12854]),
    ("Varrock West", &[12597]),
    ("Yanille", &[10057]),
];

lazy_static! {
    static ref REGION_NAMES: HashMap<i32, &'static str> = PLACES
        .iter()
        .flat_map(|(name, regions)| regions.iter().map(move |region| (*region, *name)))
        .collect();
}

/// Human-readable name for a region, or `Region <id>` when unmapped.
pub fn region_name(region_id: i32) -> String {
    match REGION_NAMES.get(&region_id) {
        Some(name) => (*name).to_string(),
        None => format!("Region {}", region_id),
    }
}

pub fn location_name(point: &WorldPoint) -> String {
    region_name(point.region_id())
}
