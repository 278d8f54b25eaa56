//! Driver index models from entity index metadata.

use bson::{Document, doc};
use docmap_mapping::{IndexDefinition, IndexKind};
use mongodb::IndexModel;
use mongodb::options::IndexOptions;

/// Key document of an index definition.
pub fn index_keys(definition: &IndexDefinition) -> Document {
    match definition.kind {
        IndexKind::Ascending => doc! { definition.field.as_str(): 1 },
        IndexKind::Geo2d { .. } => doc! { definition.field.as_str(): "2d" },
    }
}

/// Options of an index definition.
pub fn index_options(definition: &IndexDefinition) -> IndexOptions {
    let mut options = IndexOptions::default();
    options.name = definition.name.clone();

    if definition.unique {
        options.unique = Some(true);
    }

    if let IndexKind::Geo2d { min, max, bits } = definition.kind {
        options.min = Some(f64::from(min));
        options.max = Some(f64::from(max));
        options.bits = u32::try_from(bits).ok();
    }

    options
}

/// Convert an index definition to a driver index model.
pub fn index_model(definition: &IndexDefinition) -> IndexModel {
    IndexModel::builder()
        .keys(index_keys(definition))
        .options(index_options(definition))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn definition(kind: IndexKind, unique: bool, name: Option<&str>) -> IndexDefinition {
        IndexDefinition {
            collection: "places".to_string(),
            field: "loc".to_string(),
            kind,
            unique,
            name: name.map(String::from),
        }
    }

    #[test]
    fn test_ascending_unique_index() {
        let def = definition(IndexKind::Ascending, true, Some("loc_unique"));
        assert_eq!(index_keys(&def), doc! { "loc": 1 });

        let options = index_options(&def);
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.name.as_deref(), Some("loc_unique"));
        assert_eq!(options.bits, None);
    }

    #[test]
    fn test_geo_index() {
        let def = definition(
            IndexKind::Geo2d {
                min: -90,
                max: 90,
                bits: 32,
            },
            false,
            None,
        );
        assert_eq!(index_keys(&def), doc! { "loc": "2d" });

        let options = index_options(&def);
        assert_eq!(options.min, Some(-90.0));
        assert_eq!(options.max, Some(90.0));
        assert_eq!(options.bits, Some(32));
        assert_eq!(options.unique, None);
    }

    #[test]
    fn test_negative_bits_are_dropped() {
        let def = definition(
            IndexKind::Geo2d {
                min: -180,
                max: 180,
                bits: -1,
            },
            false,
            None,
        );
        assert_eq!(index_options(&def).bits, None);

        let model = index_model(&def);
        assert_eq!(model.keys, doc! { "loc": "2d" });
    }
}
