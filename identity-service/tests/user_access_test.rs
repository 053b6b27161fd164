//! Permission resolver: role/permission checks, syncs, and join mutations.

mod common;

use common::{seed_user, test_state};
use identity_service::services::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn test_permission_via_direct_grant_role_or_neither() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let editor = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();
    let edit_post = state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap();

    // Neither path yet.
    assert!(!state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());

    // Via role only.
    state
        .roles
        .sync_role_permissions(editor.id, &[edit_post.id])
        .await
        .unwrap();
    state.access.add_role_to_user(user.id, editor.id).await.unwrap();
    assert!(state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());

    // Direct only.
    state
        .access
        .remove_role_from_user(user.id, editor.id)
        .await
        .unwrap();
    state
        .access
        .give_permission_to_user(user.id, edit_post.id)
        .await
        .unwrap();
    assert!(state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());

    // Unknown permission name is simply false.
    assert!(!state
        .access
        .user_has_permission(user.id, "no_such_permission")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_effective_permissions_deduplicate_both_paths() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let editor = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();
    let edit_post = state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap();
    let delete_post = state
        .permissions
        .create_permission("delete_post".to_string(), None)
        .await
        .unwrap();

    // edit_post granted both directly and through the role.
    state
        .roles
        .sync_role_permissions(editor.id, &[edit_post.id, delete_post.id])
        .await
        .unwrap();
    state.access.add_role_to_user(user.id, editor.id).await.unwrap();
    state
        .access
        .give_permission_to_user(user.id, edit_post.id)
        .await
        .unwrap();

    let effective = state.access.effective_permissions(user.id).await.unwrap();
    assert_eq!(effective.len(), 2);
    assert!(effective.contains("edit_post"));
    assert!(effective.contains("delete_post"));
}

#[tokio::test]
async fn test_sync_user_roles_replaces_everything() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let r1 = state.roles.create_role("r1".to_string(), None).await.unwrap();
    let r2 = state.roles.create_role("r2".to_string(), None).await.unwrap();
    let r3 = state.roles.create_role("r3".to_string(), None).await.unwrap();

    state
        .access
        .sync_user_roles(user.id, &[r1.id, r2.id])
        .await
        .unwrap();
    assert!(state.access.user_has_role(user.id, "r1").await.unwrap());
    assert!(state.access.user_has_role(user.id, "r2").await.unwrap());

    state.access.sync_user_roles(user.id, &[r3.id]).await.unwrap();

    // No residue of the first sync.
    assert!(!state.access.user_has_role(user.id, "r1").await.unwrap());
    assert!(!state.access.user_has_role(user.id, "r2").await.unwrap());
    assert!(state.access.user_has_role(user.id, "r3").await.unwrap());
    assert_eq!(state.access.user_roles(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sync_with_unknown_role_changes_nothing() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;
    let r1 = state.roles.create_role("r1".to_string(), None).await.unwrap();

    state.access.sync_user_roles(user.id, &[r1.id]).await.unwrap();

    let err = state
        .access
        .sync_user_roles(user.id, &[Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // The failed replace must not be partially observable.
    assert!(state.access.user_has_role(user.id, "r1").await.unwrap());
}

#[tokio::test]
async fn test_add_role_conflicts_and_missing_endpoints() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;
    let role = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();

    state.access.add_role_to_user(user.id, role.id).await.unwrap();

    let err = state
        .access
        .add_role_to_user(user.id, role.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = state
        .access
        .add_role_to_user(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = state
        .access
        .add_role_to_user(Uuid::new_v4(), role.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = state
        .access
        .remove_role_from_user(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_role_permission_sync_cascades_to_users() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let editor = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();
    let edit_post = state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap();
    let publish = state
        .permissions
        .create_permission("publish_post".to_string(), None)
        .await
        .unwrap();

    state.access.add_role_to_user(user.id, editor.id).await.unwrap();
    state
        .roles
        .sync_role_permissions(editor.id, &[edit_post.id])
        .await
        .unwrap();
    assert!(state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());

    state
        .roles
        .sync_role_permissions(editor.id, &[publish.id])
        .await
        .unwrap();
    assert!(!state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());
    assert!(state
        .access
        .user_has_permission(user.id, "publish_post")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_duplicate_role_and_permission_names_conflict() {
    let (state, _, _) = test_state();

    state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();
    let err = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap();
    let err = state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn test_deleting_a_role_revokes_inherited_permissions() {
    let (state, store, _) = test_state();
    let user = seed_user(&store, "a@x.com", "a", "Sup3rSecret!", true).await;

    let editor = state
        .roles
        .create_role("editor".to_string(), None)
        .await
        .unwrap();
    let edit_post = state
        .permissions
        .create_permission("edit_post".to_string(), None)
        .await
        .unwrap();
    state
        .roles
        .sync_role_permissions(editor.id, &[edit_post.id])
        .await
        .unwrap();
    state.access.add_role_to_user(user.id, editor.id).await.unwrap();

    state.roles.delete_role(editor.id).await.unwrap();

    assert!(!state.access.user_has_role(user.id, "editor").await.unwrap());
    assert!(!state
        .access
        .user_has_permission(user.id, "edit_post")
        .await
        .unwrap());
    assert!(state
        .access
        .effective_permissions(user.id)
        .await
        .unwrap()
        .is_empty());
}
