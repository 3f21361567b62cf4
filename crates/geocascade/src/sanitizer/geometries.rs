use std::fmt;

use tracing::debug;

/// The geometry kinds a caller may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometrySet {
    pub point: bool,
    pub polygon: bool,
}

impl GeometrySet {
    pub const POINT_ONLY: Self = Self {
        point: true,
        polygon: false,
    };

    pub fn wants_polygons(self) -> bool {
        self.polygon
    }
}

impl Default for GeometrySet {
    fn default() -> Self {
        Self::POINT_ONLY
    }
}

impl fmt::Display for GeometrySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.point, self.polygon) {
            (true, true) => write!(f, "point,polygon"),
            (false, true) => write!(f, "polygon"),
            _ => write!(f, "point"),
        }
    }
}

/// Parse the comma separated `geometries` parameter.
///
/// Every unknown token adds one warning. Without any valid token, or without the parameter,
/// only points are returned.
pub fn parse_geometries(raw: Option<&str>, warnings: &mut Vec<String>) -> GeometrySet {
    let Some(raw) = raw else {
        return GeometrySet::POINT_ONLY;
    };

    let mut set = GeometrySet {
        point: false,
        polygon: false,
    };
    for token in raw.split(',') {
        match token.trim() {
            "point" => set.point = true,
            "polygon" => set.polygon = true,
            other => warnings.push(format!("{other} is not a valid geometry type")),
        }
    }

    if !set.point && !set.polygon {
        debug!(raw, "No valid geometry type, defaulting to point");
        return GeometrySet::POINT_ONLY;
    }
    set
}
