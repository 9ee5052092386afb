//! Trust-boundary-first ordering of child pushes.

use sync_types::SyncableId;

/// Order a folder's diverging children for pushing.
///
/// The access-control bundle must reach the peer before any sibling
/// content; a peer that saw content first could observe items it is not
/// yet entitled to trust. Once the access bundle matches, the
/// store-changes bundle takes priority, then everything else in id order.
pub fn push_order(mut ids: Vec<SyncableId>) -> Vec<SyncableId> {
    ids.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.cmp(b)));
    ids
}

fn rank(id: &SyncableId) -> u8 {
    if id.is_access_bundle() {
        0
    } else if id.is_changes_bundle() {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{ACCESS_BUNDLE_NAME, CHANGES_BUNDLE_NAME};

    #[test]
    fn access_bundle_always_first() {
        let ordered = push_order(vec![
            SyncableId::file("zz"),
            SyncableId::bundle(CHANGES_BUNDLE_NAME),
            SyncableId::file("aa"),
            SyncableId::bundle(ACCESS_BUNDLE_NAME),
        ]);
        assert!(ordered[0].is_access_bundle());
        assert!(ordered[1].is_changes_bundle());
        assert_eq!(ordered[2], SyncableId::file("aa"));
        assert_eq!(ordered[3], SyncableId::file("zz"));
    }

    #[test]
    fn changes_bundle_leads_without_access_bundle() {
        let ordered = push_order(vec![
            SyncableId::file("a"),
            SyncableId::bundle(CHANGES_BUNDLE_NAME),
        ]);
        assert!(ordered[0].is_changes_bundle());
    }

    #[test]
    fn plain_children_keep_id_order() {
        let ordered = push_order(vec![
            SyncableId::folder("b"),
            SyncableId::file("b"),
            SyncableId::file("a"),
        ]);
        assert_eq!(ordered[0], SyncableId::file("a"));
        assert_eq!(ordered[1], SyncableId::file("b"));
        assert_eq!(ordered[2], SyncableId::folder("b"));
    }

    #[test]
    fn a_file_named_access_gets_no_priority() {
        let ordered = push_order(vec![
            SyncableId::file(ACCESS_BUNDLE_NAME),
            SyncableId::file("aa"),
        ]);
        // Plain id order: "aa" < "access".
        assert_eq!(ordered[0], SyncableId::file("aa"));
    }
}
