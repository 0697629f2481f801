//! Lenient view of the on-disk bundle artifact
//!
//! Each field is decoded on its own so that one malformed field does not
//! cost the others.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::BundleLoadError;
use crate::model::{AssetManifest, Mode};

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawEntry {
    pub module: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRoute {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub index: bool,
    pub module: Option<String>,
}

/// Routes may be emitted as an ordered list or as a map keyed by id
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRouteList {
    List(Vec<RawRoute>),
    Map(BTreeMap<String, RawRoute>),
}

impl RawRouteList {
    fn into_routes(self) -> Vec<RawRoute> {
        match self {
            RawRouteList::List(routes) => routes,
            RawRouteList::Map(routes) => routes
                .into_iter()
                .map(|(key, mut route)| {
                    route.id.get_or_insert(key);
                    route
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RawBundle {
    pub entry: Option<RawEntry>,
    pub root: Option<RawRoute>,
    pub routes: Option<Vec<RawRoute>>,
    pub assets: Option<AssetManifest>,
    pub mode: Option<Mode>,
    pub public_path: Option<String>,
}

impl RawBundle {
    pub(crate) fn from_value(value: Value) -> Result<Self, BundleLoadError> {
        let Value::Object(mut obj) = value else {
            return Err(BundleLoadError::NotAnObject);
        };

        let (root, routes) = match obj.remove("routes") {
            Some(Value::Object(mut tree)) => {
                let root = field::<RawRoute>(&mut tree, "routes.root");
                let routes = field::<RawRouteList>(&mut tree, "routes.routes")
                    .map(RawRouteList::into_routes);
                (root, routes)
            }
            Some(Value::Null) | None => (None, None),
            Some(_) => {
                tracing::warn!(field = "routes", "Ignoring malformed bundle field");
                (None, None)
            }
        };

        Ok(Self {
            entry: field(&mut obj, "entry"),
            root,
            routes,
            assets: field(&mut obj, "assets"),
            mode: field(&mut obj, "mode"),
            public_path: field(&mut obj, "publicPath"),
        })
    }
}

/// Take `key` (last dotted segment) out of `obj` and decode it, logging and
/// discarding a malformed value.
fn field<T: DeserializeOwned>(obj: &mut Map<String, Value>, key: &str) -> Option<T> {
    let name = key.rsplit('.').next().unwrap_or(key);
    match obj.remove(name)? {
        Value::Null => None,
        value => match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(field = key, error = %e, "Ignoring malformed bundle field");
                None
            }
        },
    }
}
