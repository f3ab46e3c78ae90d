//! Property-based tests for core types.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::{PermissionName, PermissionPattern, UserId, normalize_email};
    use proptest::prelude::*;
    use uuid::Uuid;

    proptest! {
        #[test]
        fn test_user_id_display_parse_roundtrip(uuid in any::<u128>()) {
            let id = UserId::from_uuid(Uuid::from_u128(uuid));
            let parsed: UserId = id.to_string().parse().unwrap();
            prop_assert_eq!(id, parsed);
        }

        #[test]
        fn test_permission_name_halves(resource in "[a-z][a-z0-9_]{0,12}", action in "[a-z][a-z0-9_]{0,12}") {
            let name: PermissionName = format!("{resource}.{action}").parse().unwrap();
            prop_assert_eq!(name.resource(), resource.as_str());
            prop_assert_eq!(name.action(), action.as_str());
        }

        #[test]
        fn test_wildcard_patterns_cover_their_side(resource in "[a-z]{1,8}", action in "[a-z]{1,8}") {
            let name = PermissionName::new(&resource, &action).unwrap();
            let by_resource: PermissionPattern = format!("{resource}.*").parse().unwrap();
            let by_action: PermissionPattern = format!("*.{action}").parse().unwrap();
            prop_assert!(by_resource.matches(&name));
            prop_assert!(by_action.matches(&name));
        }

        #[test]
        fn test_email_normalization_is_case_insensitive(local in "[a-zA-Z0-9.]{1,10}", domain in "[a-zA-Z]{1,8}\\.[a-z]{2,3}") {
            let email = format!("{local}@{domain}");
            prop_assert_eq!(
                normalize_email(&email.to_uppercase()).unwrap(),
                normalize_email(&email.to_lowercase()).unwrap()
            );
        }
    }
}
