/// Join key column names
pub const LON_COLUMN: &str = "lon";
pub const LAT_COLUMN: &str = "lat";
pub const DATE_COLUMN: &str = "date";

/// Raw export columns
pub const GEOMETRY_COLUMN: &str = ".geo";
pub const SYSTEM_INDEX_COLUMN: &str = "system:index";

/// Source suffixes applied to overlapping columns of the first join
pub const SUFFIX_SOURCE_A: &str = "_dt1";
pub const SUFFIX_SOURCE_B: &str = "_dt2";

/// Measurement columns consumed by the feature engineer
pub const CLOUD_COVER: &str = "Cloud_Cover_Mean_24h";
pub const RELATIVE_HUMIDITY: &str = "relative_humidity";
pub const TEMPERATURE_C: &str = "temperature_2m_C";
pub const PRECIPITATION: &str = "total_precipitation_sum";
pub const SURFACE_PRESSURE: &str = "surface_pressure";
pub const ELEVATION: &str = "elevation";
pub const SOLAR_RADIATION: &str = "surface_net_solar_radiation_sum";
pub const WIND_DIRECTION: &str = "wind_direction";
pub const WIND_SPEED: &str = "wind_speed";

/// Prediction output column
pub const PREDICTION_COLUMN: &str = "radiation_pred";

/// Coordinates are rounded to 7 decimal places before joining
pub const COORDINATE_SCALE: f64 = 1e7;

/// Day-of-year encodings always divide by a 365-day year
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Columns dropped by the cleaning step
pub const REDUNDANT_COLUMNS: [&str; 5] = [
    "Temperature_Air_2m_Mean_24h",
    "Temperature_Air_2m_Mean_24h_C",
    "temperature_2m",
    "Wind_Speed_10m_Mean_24h",
    GEOMETRY_COLUMN,
];

/// Region properties in the boundaries GeoJSON
pub const REGION_ID_PROPERTY: &str = "ID_CORR";
pub const PROVINCE_PROPERTY: &str = "Provincia";
pub const DISTRICT_PROPERTY: &str = "Corregimiento";

/// Panama geographic bounds
pub const PANAMA_MIN_LAT: f64 = 7.0;
pub const PANAMA_MAX_LAT: f64 = 10.0;
pub const PANAMA_MIN_LON: f64 = -83.5;
pub const PANAMA_MAX_LON: f64 = -77.0;

// Coverage scan grid spacing in degrees, roughly 22 km
pub const DEFAULT_SCAN_STEP: f64 = 0.2;

/// Remote query defaults
pub const DEFAULT_BUFFER_RADIUS_M: f64 = 25_000.0;
pub const DEFAULT_STATIC_BUFFER_M: f64 = 100.0;
pub const DEFAULT_DATA_DELAY_DAYS: u64 = 20;

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
