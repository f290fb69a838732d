//! Names of well-known GATT services and characteristics.
//!
//! Both tables are keyed by 16-bit assigned number and sorted so lookups
//! are a binary search over read-only static data.

use uuid::Uuid;

use crate::core::bluetooth::constants::uuid_to_u16;

/// Looks up the name of a well-known service
pub fn service_name(uuid: &Uuid) -> Option<&'static str> {
    lookup(SERVICE_NAMES, uuid)
}

/// Looks up the name of a well-known characteristic
pub fn characteristic_name(uuid: &Uuid) -> Option<&'static str> {
    lookup(CHARACTERISTIC_NAMES, uuid)
}

fn lookup(table: &'static [(u16, &'static str)], uuid: &Uuid) -> Option<&'static str> {
    let short = uuid_to_u16(uuid)?;
    table
        .binary_search_by_key(&short, |(number, _)| *number)
        .ok()
        .map(|index| table[index].1)
}

static SERVICE_NAMES: &[(u16, &str)] = &[
    (0x1800, "generic access"),
    (0x1801, "generic attribute"),
    (0x1802, "immediate alert"),
    (0x1803, "link loss"),
    (0x1804, "tx power"),
    (0x1805, "current time"),
    (0x1806, "reference time update"),
    (0x1807, "next dst change"),
    (0x1808, "glucose"),
    (0x1809, "health thermometer"),
    (0x180A, "device information"),
    (0x180D, "heart rate"),
    (0x180E, "phone alert status"),
    (0x180F, "battery"),
    (0x1810, "blood pressure"),
    (0x1811, "alert notification"),
    (0x1812, "human interface device"),
    (0x1813, "scan parameters"),
    (0x1814, "running speed and cadence"),
    (0x1815, "automation io"),
    (0x1816, "cycling speed and cadence"),
    (0x1818, "cycling power"),
    (0x1819, "location and navigation"),
    (0x181A, "environmental sensing"),
    (0x181B, "body composition"),
    (0x181C, "user data"),
    (0x181D, "weight scale"),
    (0x181E, "bond management"),
    (0x181F, "continuous glucose monitoring"),
    (0x1820, "internet protocol support"),
    (0x1821, "indoor positioning"),
    (0x1822, "pulse oximeter"),
    (0x1823, "http proxy"),
    (0x1824, "transport discovery"),
    (0x1825, "object transfer"),
    (0x1826, "fitness machine"),
    (0x1827, "mesh provisioning"),
    (0x1828, "mesh proxy"),
    (0x1829, "reconnection configuration"),
    (0x183A, "insulin delivery"),
    (0x183B, "binary sensor"),
    (0x183C, "emergency configuration"),
    (0x183E, "physical activity monitor"),
    (0x1843, "audio input control"),
    (0x1844, "volume control"),
    (0x1845, "volume offset control"),
    (0x1846, "coordinated set identification"),
    (0x1847, "device time"),
    (0x1848, "media control"),
    (0x1849, "generic media control"),
    (0x184A, "constant tone extension"),
    (0x184B, "telephone bearer"),
    (0x184C, "generic telephone bearer"),
    (0x184D, "microphone control"),
    (0x184E, "audio stream control"),
    (0x184F, "broadcast audio scan"),
    (0x1850, "published audio capabilities"),
    (0x1851, "basic audio announcement"),
    (0x1852, "broadcast audio announcement"),
    (0x1853, "common audio"),
    (0x1854, "hearing access"),
    (0x1855, "telephony and media audio"),
    (0x1856, "public broadcast announcement"),
];

// Complete as of the 2020-01-18 assigned numbers document.
static CHARACTERISTIC_NAMES: &[(u16, &str)] = &[
    (0x2A00, "device name"),
    (0x2A01, "appearance"),
    (0x2A02, "peripheral privacy flag"),
    (0x2A03, "reconnection address"),
    (0x2A04, "peripheral preferred connection parameters"),
    (0x2A05, "service changed"),
    (0x2A06, "alert level"),
    (0x2A07, "tx power level"),
    (0x2A08, "date time"),
    (0x2A09, "day of week"),
    (0x2A0A, "day date time"),
    (0x2A0C, "exact time 256"),
    (0x2A0D, "dst offset"),
    (0x2A0E, "time zone"),
    (0x2A0F, "local time"),
    (0x2A11, "time with dst"),
    (0x2A12, "time accuracy"),
    (0x2A13, "time source"),
    (0x2A14, "reference time information"),
    (0x2A16, "time update control point"),
    (0x2A17, "time update state"),
    (0x2A18, "glucose measurement"),
    (0x2A19, "battery level"),
    (0x2A1C, "temperature measurement"),
    (0x2A1D, "temperature type"),
    (0x2A1E, "intermediate temperature"),
    (0x2A21, "measurement interval"),
    (0x2A22, "boot keyboard input report"),
    (0x2A23, "system id"),
    (0x2A24, "model number string"),
    (0x2A25, "serial number string"),
    (0x2A26, "firmware revision string"),
    (0x2A27, "hardware revision string"),
    (0x2A28, "software revision string"),
    (0x2A29, "manufacturer name string"),
    (0x2A2A, "ieee 11073 20601 regulatory certification data list"),
    (0x2A2B, "current time"),
    (0x2A31, "scan refresh"),
    (0x2A32, "boot keyboard output report"),
    (0x2A33, "boot mouse input report"),
    (0x2A34, "glucose measurement context"),
    (0x2A35, "blood pressure measurement"),
    (0x2A36, "intermediate cuff pressure"),
    (0x2A37, "heart rate measurement"),
    (0x2A38, "body sensor location"),
    (0x2A39, "heart rate control point"),
    (0x2A3F, "alert status"),
    (0x2A40, "ringer control point"),
    (0x2A41, "ringer setting"),
    (0x2A42, "alert category id bit mask"),
    (0x2A43, "alert category id"),
    (0x2A44, "alert notification control point"),
    (0x2A45, "unread alert status"),
    (0x2A46, "new alert"),
    (0x2A47, "supported new alert category"),
    (0x2A48, "supported unread alert category"),
    (0x2A49, "blood pressure feature"),
    (0x2A4A, "hid information"),
    (0x2A4B, "report map"),
    (0x2A4C, "hid control point"),
    (0x2A4D, "report"),
    (0x2A4E, "protocol mode"),
    (0x2A4F, "scan interval window"),
    (0x2A50, "pnp id"),
    (0x2A51, "glucose feature"),
    (0x2A52, "record access control point"),
    (0x2A53, "rsc measurement"),
    (0x2A54, "rsc feature"),
    (0x2A55, "sc control point"),
    (0x2A5A, "aggregate"),
    (0x2A5B, "csc measurement"),
    (0x2A5C, "csc feature"),
    (0x2A5D, "sensor location"),
    (0x2A5E, "plx spot check measurement"),
    (0x2A5F, "plx continuous measurement"),
    (0x2A60, "plx features"),
    (0x2A63, "cycling power measurement"),
    (0x2A64, "cycling power vector"),
    (0x2A65, "cycling power feature"),
    (0x2A66, "cycling power control point"),
    (0x2A67, "location and speed"),
    (0x2A68, "navigation"),
    (0x2A69, "position quality"),
    (0x2A6A, "ln feature"),
    (0x2A6B, "ln control point"),
    (0x2A6C, "elevation"),
    (0x2A6D, "pressure"),
    (0x2A6E, "temperature"),
    (0x2A6F, "humidity"),
    (0x2A70, "true wind speed"),
    (0x2A71, "true wind direction"),
    (0x2A72, "apparent wind speed"),
    (0x2A73, "apparent wind direction"),
    (0x2A74, "gust factor"),
    (0x2A75, "pollen concentration"),
    (0x2A76, "uv index"),
    (0x2A77, "irradiance"),
    (0x2A78, "rainfall"),
    (0x2A79, "wind chill"),
    (0x2A7A, "heat index"),
    (0x2A7B, "dew point"),
    (0x2A7D, "descriptor value changed"),
    (0x2A7E, "aerobic heart rate lower limit"),
    (0x2A7F, "aerobic threshold"),
    (0x2A80, "age"),
    (0x2A81, "anaerobic heart rate lower limit"),
    (0x2A82, "anaerobic heart rate upper limit"),
    (0x2A83, "anaerobic threshold"),
    (0x2A84, "aerobic heart rate upper limit"),
    (0x2A85, "date of birth"),
    (0x2A86, "date of threshold assessment"),
    (0x2A87, "email address"),
    (0x2A88, "fat burn heart rate lower limit"),
    (0x2A89, "fat burn heart rate upper limit"),
    (0x2A8A, "first name"),
    (0x2A8B, "five zone heart rate limits"),
    (0x2A8C, "gender"),
    (0x2A8D, "heart rate max"),
    (0x2A8E, "height"),
    (0x2A8F, "hip circumference"),
    (0x2A90, "last name"),
    (0x2A91, "maximum recommended heart rate"),
    (0x2A92, "resting heart rate"),
    (0x2A93, "sport type for aerobic and anaerobic thresholds"),
    (0x2A94, "three zone heart rate limits"),
    (0x2A95, "two zone heart rate limits"),
    (0x2A96, "vo2 max"),
    (0x2A97, "waist circumference"),
    (0x2A98, "weight"),
    (0x2A99, "database change increment"),
    (0x2A9A, "user index"),
    (0x2A9B, "body composition feature"),
    (0x2A9C, "body composition measurement"),
    (0x2A9D, "weight measurement"),
    (0x2A9E, "weight scale feature"),
    (0x2A9F, "user control point"),
    (0x2AA0, "magnetic flux density 2d"),
    (0x2AA1, "magnetic flux density 3d"),
    (0x2AA2, "language"),
    (0x2AA3, "barometric pressure trend"),
    (0x2AA4, "bond management control point"),
    (0x2AA5, "bond management feature"),
    (0x2AA6, "central address resolution"),
    (0x2AA7, "cgm measurement"),
    (0x2AA8, "cgm feature"),
    (0x2AA9, "cgm status"),
    (0x2AAA, "cgm session start time"),
    (0x2AAB, "cgm session run time"),
    (0x2AAC, "cgm specific ops control point"),
    (0x2AAD, "indoor positioning configuration"),
    (0x2AAE, "latitude"),
    (0x2AAF, "longitude"),
    (0x2AB0, "local north coordinate"),
    (0x2AB1, "local east coordinate"),
    (0x2AB2, "floor number"),
    (0x2AB3, "altitude"),
    (0x2AB4, "uncertainty"),
    (0x2AB5, "location name"),
    (0x2AB6, "uri"),
    (0x2AB7, "http headers"),
    (0x2AB8, "http status code"),
    (0x2AB9, "http entity body"),
    (0x2ABA, "http control point"),
    (0x2ABB, "https security"),
    (0x2ABC, "tds control point"),
    (0x2ABD, "ots feature"),
    (0x2ABE, "object name"),
    (0x2ABF, "object type"),
    (0x2AC0, "object size"),
    (0x2AC1, "object first created"),
    (0x2AC2, "object last modified"),
    (0x2AC3, "object id"),
    (0x2AC4, "object properties"),
    (0x2AC5, "object actioncontrol point"),
    (0x2AC6, "object list control point"),
    (0x2AC7, "object list filter"),
    (0x2AC8, "object changed"),
    (0x2AC9, "resolvable private address only"),
    (0x2ACA, "unspecified"),
    (0x2ACB, "directory listing"),
    (0x2ACC, "fitness machine feature"),
    (0x2ACD, "treadmill data"),
    (0x2ACE, "cross trainer data"),
    (0x2ACF, "step climber data"),
    (0x2AD0, "stair climber data"),
    (0x2AD1, "rower data"),
    (0x2AD2, "indoor bike data"),
    (0x2AD3, "training status"),
    (0x2AD4, "supported speed range"),
    (0x2AD5, "supported inclination range"),
    (0x2AD6, "supported resistance level range"),
    (0x2AD7, "supported heart rate range"),
    (0x2AD8, "supported power range"),
    (0x2AD9, "fitness machine control point"),
    (0x2ADA, "fitness machine status"),
    (0x2ADB, "mesh provisioning data in"),
    (0x2ADC, "mesh provisioning data out"),
    (0x2ADD, "mesh proxy data in"),
    (0x2ADE, "mesh proxy data out"),
    (0x2AE0, "average current"),
    (0x2AE1, "average voltage"),
    (0x2AE2, "boolean"),
    (0x2AE3, "chromatic distance from planckian"),
    (0x2AE4, "chromaticity coordinates"),
    (0x2AE5, "chromaticity in cct and duv values"),
    (0x2AE6, "chromaticity tolerance"),
    (0x2AE7, "cie 13 3 1995 color rendering index"),
    (0x2AE8, "coefficient"),
    (0x2AE9, "correlated color temperature"),
    (0x2AEA, "count 16"),
    (0x2AEB, "count 24"),
    (0x2AEC, "country code"),
    (0x2AED, "date utc"),
    (0x2AEE, "electric current"),
    (0x2AEF, "electric current range"),
    (0x2AF0, "electric current specification"),
    (0x2AF1, "electric current statistics"),
    (0x2AF2, "energy"),
    (0x2AF3, "energy in a period of day"),
    (0x2AF4, "event statistics"),
    (0x2AF5, "fixed string 16"),
    (0x2AF6, "fixed string 24"),
    (0x2AF7, "fixed string 36"),
    (0x2AF8, "fixed string 8"),
    (0x2AF9, "generic level"),
    (0x2AFA, "global trade item number"),
    (0x2AFB, "illuminance"),
    (0x2AFC, "luminous efficacy"),
    (0x2AFD, "luminous energy"),
    (0x2AFE, "luminous exposure"),
    (0x2AFF, "luminous flux"),
    (0x2B00, "luminous flux range"),
    (0x2B01, "luminous intensity"),
    (0x2B02, "mass flow"),
    (0x2B03, "perceived lightness"),
    (0x2B04, "percentage 8"),
    (0x2B05, "power"),
    (0x2B06, "power specification"),
    (0x2B07, "relative runtime in a current range"),
    (0x2B08, "relative runtime in a generic level range"),
    (0x2B09, "relative value in a voltage range"),
    (0x2B0A, "relative value in an illuminance range"),
    (0x2B0B, "relative value in a period of day"),
    (0x2B0C, "relative value in a temperature range"),
    (0x2B0D, "temperature 8"),
    (0x2B0E, "temperature 8 in a period of day"),
    (0x2B0F, "temperature 8 statistics"),
    (0x2B10, "temperature range"),
    (0x2B11, "temperature statistics"),
    (0x2B12, "time decihour 8"),
    (0x2B13, "time exponential 8"),
    (0x2B14, "time hour 24"),
    (0x2B15, "time millisecond 24"),
    (0x2B16, "time second 16"),
    (0x2B17, "time second 8"),
    (0x2B18, "voltage"),
    (0x2B19, "voltage specification"),
    (0x2B1A, "voltage statistics"),
    (0x2B1B, "volume flow"),
    (0x2B1C, "chromaticity coordinate"),
    (0x2B1D, "rc feature"),
    (0x2B1E, "rc settings"),
    (0x2B1F, "reconnection configuration control point"),
    (0x2B20, "idd status changed"),
    (0x2B21, "idd status"),
    (0x2B22, "idd annunciation status"),
    (0x2B23, "idd features"),
    (0x2B24, "idd status reader control point"),
    (0x2B25, "idd command control point"),
    (0x2B26, "idd command data"),
    (0x2B27, "idd record access control point"),
    (0x2B28, "idd history data"),
    (0x2B29, "client supported features"),
    (0x2B2A, "database hash"),
    (0x2B2B, "bss control point"),
    (0x2B2C, "bss response"),
    (0x2B2D, "emergency id"),
    (0x2B2E, "emergency text"),
    (0x2B34, "enhanced blood pressure measurement"),
    (0x2B35, "enhanced intermediate cuff pressure"),
    (0x2B36, "blood pressure record"),
    (0x2B38, "br edr handover data"),
    (0x2B39, "bluetooth sig data"),
    (0x2B3A, "server supported features"),
    (0x2B3B, "physical activity monitor features"),
    (0x2B3C, "general activity instantaneous data"),
    (0x2B3D, "general activity summary data"),
    (0x2B3E, "cardiorespiratory activity instantaneous data"),
    (0x2B3F, "cardiorespiratory activity summary data"),
    (0x2B40, "step counter activity summary data"),
    (0x2B41, "sleep activity instantaneous data"),
    (0x2B42, "sleep activity summary data"),
    (0x2B43, "physical activity monitor control point"),
    (0x2B44, "current session"),
    (0x2B45, "session"),
    (0x2B46, "preferred units"),
    (0x2B47, "high resolution height"),
    (0x2B48, "middle name"),
    (0x2B49, "stride length"),
    (0x2B4A, "handedness"),
    (0x2B4B, "device wearing position"),
    (0x2B4C, "four zone heart rate limits"),
    (0x2B4D, "high intensity exercise threshold"),
    (0x2B4E, "activity goal"),
    (0x2B4F, "sedentary interval notification"),
    (0x2B50, "caloric intake"),
    (0x2B77, "audio input state"),
    (0x2B78, "gain settings attribute"),
    (0x2B79, "audio input type"),
    (0x2B7A, "audio input status"),
    (0x2B7B, "audio input control point"),
    (0x2B7C, "audio input description"),
    (0x2B7D, "volume state"),
    (0x2B7E, "volume control point"),
    (0x2B7F, "volume flags"),
    (0x2B80, "offset state"),
    (0x2B81, "audio location"),
    (0x2B82, "volume offset control point"),
    (0x2B83, "audio output description"),
    (0x2B8E, "device time feature"),
    (0x2B8F, "device time parameters"),
    (0x2B90, "device time"),
    (0x2B91, "device time control point"),
    (0x2B92, "time change log data"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::uuid_from_u16;

    #[test]
    fn tables_are_sorted_and_unique() {
        for table in [SERVICE_NAMES, CHARACTERISTIC_NAMES] {
            assert!(table.windows(2).all(|pair| pair[0].0 < pair[1].0));
        }
    }

    #[test]
    fn resolves_well_known_numbers() {
        assert_eq!(service_name(&uuid_from_u16(0x180F)), Some("battery"));
        assert_eq!(characteristic_name(&uuid_from_u16(0x2A00)), Some("device name"));
        assert_eq!(characteristic_name(&uuid_from_u16(0x2A19)), Some("battery level"));
        assert_eq!(
            characteristic_name(&uuid_from_u16(0x2A37)),
            Some("heart rate measurement")
        );
    }

    #[test]
    fn unknown_numbers_resolve_to_none() {
        assert_eq!(characteristic_name(&uuid_from_u16(0x180F)), None);
        assert_eq!(service_name(&uuid_from_u16(0xFFF0)), None);
        let vendor = Uuid::from_u128(0x4f63756c_7573_2054_6872_65656d6f7465);
        assert_eq!(service_name(&vendor), None);
    }
}
