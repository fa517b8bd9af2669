use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnRelations,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
    ManageUsers,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if &session.role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtSessionData;

    fn session(role: UserRole) -> SessionData {
        JwtSessionData::new(1, String::from("someone"), role).into()
    }

    #[test]
    fn plain_users_manage_their_own_things() {
        let session = session(UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&session));
        assert!(ActionType::ManageOwnRelations.authenticate(&session));
        assert!(!ActionType::ManageTags.authenticate(&session));
        assert!(!ActionType::ManageAllRecipes.authenticate(&session));
    }

    #[test]
    fn admins_manage_everything() {
        let session = session(UserRole::Admin);
        assert!(ActionType::ManageTags.authenticate(&session));
        assert!(ActionType::ManageIngredients.authenticate(&session));
        assert!(ActionType::ManageAllRecipes.authenticate(&session));
        assert!(ActionType::ManageUsers.authenticate(&session));
    }
}
