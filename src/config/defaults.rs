//! Built-in kit layouts
//!
//! These provide zero-config support for the kits the registry was built for

use crate::config::layout::{LibrarySpec, SdkLayout};
use std::collections::HashMap;

pub fn get_default_layouts() -> HashMap<String, SdkLayout> {
    let mut layouts = HashMap::new();

    layouts.insert("gwt".to_string(), gwt_layout());
    layouts.insert("appengine".to_string(), appengine_layout());

    layouts
}

fn gwt_layout() -> SdkLayout {
    SdkLayout {
        name: "gwt".to_string(),
        description: "GWT SDK".to_string(),
        container_id: "com.google.gwt.eclipse.core.GWT_CONTAINER".to_string(),
        required: vec![
            "gwt-user.jar".to_string(),
            "gwt-dev.jar".to_string(),
        ],
        libraries: vec![
            LibrarySpec {
                path: "gwt-user.jar".to_string(),
                sources: Some("gwt-user.jar".to_string()),
                javadoc: Some("doc/javadoc".to_string()),
                exported: false,
            },
            LibrarySpec::binary("gwt-dev.jar"),
            LibrarySpec {
                path: "validation-api-1.0.0.GA.jar".to_string(),
                sources: Some("validation-api-1.0.0.GA-sources.jar".to_string()),
                javadoc: None,
                exported: false,
            },
        ],
    }
}

fn appengine_layout() -> SdkLayout {
    SdkLayout {
        name: "appengine".to_string(),
        description: "App Engine SDK for Java".to_string(),
        container_id: "com.google.appengine.eclipse.core.GAE_CONTAINER".to_string(),
        required: vec![
            "lib/appengine-tools-api.jar".to_string(),
            "lib/user".to_string(),
        ],
        libraries: vec![
            LibrarySpec {
                path: "lib/user/appengine-api-1.0-sdk.jar".to_string(),
                sources: None,
                javadoc: Some("docs/javadoc".to_string()),
                exported: true,
            },
            LibrarySpec {
                path: "lib/user/orm/datanucleus-appengine.jar".to_string(),
                sources: None,
                javadoc: None,
                exported: true,
            },
            LibrarySpec::binary("lib/appengine-tools-api.jar"),
        ],
    }
}
