use std::fmt;

use common::{
    error::{AppError, Res},
    misc::Environment,
};

/// One step of request processing, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ErrorHandling,
    Hsts,
    HttpsRedirection,
    StaticFiles,
    Routing,
    Authentication,
    Authorization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ErrorHandling => "error handling",
            Stage::Hsts => "hsts",
            Stage::HttpsRedirection => "https redirection",
            Stage::StaticFiles => "static files",
            Stage::Routing => "routing",
            Stage::Authentication => "authentication",
            Stage::Authorization => "authorization",
        })
    }
}

/// The ordered request pipeline for one environment.
///
/// Every environment redirects to HTTPS. Production also sends HSTS and
/// replaces error bodies with a generic page; development keeps detailed
/// errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
    production: bool,
}

impl Pipeline {
    pub fn for_environment(environment: Environment) -> Self {
        let production = environment == Environment::Production;
        let mut stages = vec![Stage::ErrorHandling];
        if production {
            stages.push(Stage::Hsts);
        }
        stages.extend([
            Stage::HttpsRedirection,
            Stage::StaticFiles,
            Stage::Routing,
            Stage::Authentication,
            Stage::Authorization,
        ]);
        Pipeline { stages, production }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn has(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Error pages are generic.
    pub fn is_hardened(&self) -> bool {
        self.production
    }

    /// Checks the ordering rules: error handling wraps everything, HTTPS
    /// redirection runs before static files short-circuit, and routing,
    /// authentication and authorization all appear in that order. HSTS is
    /// production only.
    pub fn validate(&self) -> Res<()> {
        if self.stages.first() != Some(&Stage::ErrorHandling) {
            return Err(invalid("error handling must be the outermost stage"));
        }
        for required in [
            Stage::HttpsRedirection,
            Stage::Routing,
            Stage::Authentication,
            Stage::Authorization,
        ] {
            if !self.has(required) {
                return Err(invalid(&format!("{} is missing", required)));
            }
        }
        if self.production != self.has(Stage::Hsts) {
            return Err(invalid("hsts belongs to production only"));
        }

        let ordered = [
            Stage::Hsts,
            Stage::HttpsRedirection,
            Stage::StaticFiles,
            Stage::Routing,
            Stage::Authentication,
            Stage::Authorization,
        ];
        let positions: Vec<usize> = ordered
            .iter()
            .filter_map(|stage| self.position(*stage))
            .collect();
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid(&format!("stages out of order: {}", self)));
        }
        Ok(())
    }

    fn position(&self, stage: Stage) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.stages.iter().map(Stage::to_string).collect();
        f.write_str(&names.join(" -> "))
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(format!("Invalid request pipeline: {}", message))
}
