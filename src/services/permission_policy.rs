//! services/permission_policy.rs
//! Política de permisos: funciones puras, sin I/O. El set de permisos
//! requeridos llega como dato de configuración, así el mínimo exigido
//! puede cambiar sin tocar el algoritmo de reconciliación.

use serde::Serialize;

use crate::models::permissions::{BotPermissions, Permission};

/// Resultado de chequear un snapshot contra el set requerido.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementCheck {
    pub compliant: bool,
    pub missing: Vec<Permission>,
}

/// Diferencia entre dos snapshots de permisos.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDiff {
    pub changed: bool,
    pub gained: Vec<Permission>,
    pub lost: Vec<Permission>,
    /// Subconjunto de `lost` que intersecta el set requerido: es la
    /// señal que escala un cambio de cosmético a crítico.
    pub lost_required: Vec<Permission>,
}

/// Resultado de validar una actualización manual de permisos.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateValidation {
    pub valid: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
    pub diff: PermissionDiff,
    pub check: RequirementCheck,
}

/// Cumple sólo si cada permiso de `required` está en true. Los permisos
/// fuera del set requerido nunca afectan el resultado.
pub fn check_required(permissions: &BotPermissions, required: &[Permission]) -> RequirementCheck {
    let missing: Vec<Permission> = required
        .iter()
        .copied()
        .filter(|perm| !permissions.get(*perm))
        .collect();

    RequirementCheck {
        compliant: missing.is_empty(),
        missing,
    }
}

/// Diferencia simétrica sobre el registro fijo de cinco permisos.
pub fn diff(
    old: &BotPermissions,
    new: &BotPermissions,
    required: &[Permission],
) -> PermissionDiff {
    let mut gained = Vec::new();
    let mut lost = Vec::new();

    for perm in Permission::ALL {
        match (old.get(perm), new.get(perm)) {
            (false, true) => gained.push(perm),
            (true, false) => lost.push(perm),
            _ => {}
        }
    }

    let lost_required: Vec<Permission> = lost
        .iter()
        .copied()
        .filter(|perm| required.contains(perm))
        .collect();

    PermissionDiff {
        changed: !gained.is_empty() || !lost.is_empty(),
        gained,
        lost,
        lost_required,
    }
}

/// Valida una edición manual de permisos. `valid` refleja el chequeo de
/// requeridos sobre el set propuesto; un `lost_required` no vacío
/// siempre genera warning, incluso si la propuesta sigue siendo válida.
pub fn validate_update(
    current: &BotPermissions,
    proposed: &BotPermissions,
    required: &[Permission],
) -> UpdateValidation {
    let comparison = diff(current, proposed, required);
    let check = check_required(proposed, required);

    let error = if check.compliant {
        None
    } else {
        Some(missing_message(&check.missing))
    };

    let warning = if comparison.lost_required.is_empty() {
        None
    } else {
        Some(format!(
            "Critical permissions lost: {}",
            join_permissions(&comparison.lost_required)
        ))
    };

    UpdateValidation {
        valid: check.compliant,
        error,
        warning,
        diff: comparison,
        check,
    }
}

pub fn missing_message(missing: &[Permission]) -> String {
    format!("Missing required permissions: {}", join_permissions(missing))
}

pub fn join_permissions(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|perm| perm.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Vista amigable de un snapshot para el dashboard: requeridos primero.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDisplay {
    pub permission: &'static str,
    pub label: &'static str,
    pub enabled: bool,
    pub required: bool,
    pub status: &'static str,
}

pub fn format_for_display(
    permissions: &BotPermissions,
    required: &[Permission],
) -> Vec<PermissionDisplay> {
    let mut formatted: Vec<PermissionDisplay> = Permission::ALL
        .iter()
        .map(|perm| {
            let enabled = permissions.get(*perm);
            PermissionDisplay {
                permission: perm.as_str(),
                label: perm.label(),
                enabled,
                required: required.contains(perm),
                status: if enabled { "granted" } else { "denied" },
            }
        })
        .collect();

    formatted.sort_by_key(|entry| (!entry.required, entry.label));
    formatted
}
