//! Checks whether a route can be refreshed at all.

use crate::route::Route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteValidation {
    Valid,
    Invalid(String),
}

impl RouteValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, RouteValidation::Valid)
    }
}

/// A route needs refresh enabled in its request options and the uuid of the request
/// it came from.
pub fn validate_route(route: &Route) -> RouteValidation {
    if !route.options().enable_refresh {
        return RouteValidation::Invalid("RouteOptions#enableRefresh is false".into());
    }
    if route
        .request_uuid()
        .map_or(true, |uuid| uuid.trim().is_empty())
    {
        return RouteValidation::Invalid("DirectionsRoute#requestUuid is blank".into());
    }
    RouteValidation::Valid
}

/// `"<id> <reason>"` for each invalid route, joined with `". "`.
pub fn join_validation_errors<'a>(
    results: impl IntoIterator<Item = (&'a Route, &'a RouteValidation)>,
) -> String {
    results
        .into_iter()
        .filter_map(|(route, validation)| match validation {
            RouteValidation::Valid => None,
            RouteValidation::Invalid(reason) => Some(format!("{} {}", route.id(), reason)),
        })
        .collect::<Vec<_>>()
        .join(". ")
}
