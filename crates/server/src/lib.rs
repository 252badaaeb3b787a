pub mod context;
pub mod error;
pub mod routes;
#[cfg(test)]
pub mod test_helpers;

pub type DeploymentImpl = local_deployment::LocalDeployment;
