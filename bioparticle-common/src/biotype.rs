use serde::{Deserialize, Serialize};
use std::fmt;

/// Biological role of a particle. Closed set; binding compatibility and
/// reaction dispatch are keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BioType {
    BloodCell,
    Molecule,
    Ion,
    Hormone,
    Neurotransmitter,
    ImmuneCell,
    Receptor,
    Enzyme,
    Substrate,
    Product,
    Transporter,
    IonChannel,
    Ligand,
    Pathogen,
    Nutrient,
    GasMolecule,
    Nucleotide,
    Polymerase,
    SignalMolecule,
    RegulatoryProtein,
    Organelle,
    Fluid,
}

impl BioType {
    pub const ALL: [BioType; 22] = [
        BioType::BloodCell,
        BioType::Molecule,
        BioType::Ion,
        BioType::Hormone,
        BioType::Neurotransmitter,
        BioType::ImmuneCell,
        BioType::Receptor,
        BioType::Enzyme,
        BioType::Substrate,
        BioType::Product,
        BioType::Transporter,
        BioType::IonChannel,
        BioType::Ligand,
        BioType::Pathogen,
        BioType::Nutrient,
        BioType::GasMolecule,
        BioType::Nucleotide,
        BioType::Polymerase,
        BioType::SignalMolecule,
        BioType::RegulatoryProtein,
        BioType::Organelle,
        BioType::Fluid,
    ];

    /// Types this one actively seeks out and binds to (initiator → acceptors).
    pub fn binding_targets(self) -> &'static [BioType] {
        use BioType::*;
        match self {
            Hormone | Neurotransmitter | Ligand | SignalMolecule => &[Receptor],
            Molecule => &[Enzyme, Receptor, Transporter],
            Substrate => &[Enzyme],
            Nutrient => &[Transporter],
            Ion => &[IonChannel, RegulatoryProtein],
            GasMolecule => &[BloodCell],
            ImmuneCell => &[Pathogen],
            Nucleotide => &[Polymerase],
            _ => &[],
        }
    }

    /// True when `self` initiates binding towards `other`.
    pub fn initiates(self, other: BioType) -> bool {
        self.binding_targets().contains(&other)
    }

    /// Symmetric compatibility: either orientation appears in the binding table.
    pub fn can_bind_with(self, other: BioType) -> bool {
        self.initiates(other) || other.initiates(self)
    }

    pub fn name(self) -> &'static str {
        use BioType::*;
        match self {
            BloodCell => "blood-cell",
            Molecule => "molecule",
            Ion => "ion",
            Hormone => "hormone",
            Neurotransmitter => "neurotransmitter",
            ImmuneCell => "immune-cell",
            Receptor => "receptor",
            Enzyme => "enzyme",
            Substrate => "substrate",
            Product => "product",
            Transporter => "transporter",
            IonChannel => "ion-channel",
            Ligand => "ligand",
            Pathogen => "pathogen",
            Nutrient => "nutrient",
            GasMolecule => "gas-molecule",
            Nucleotide => "nucleotide",
            Polymerase => "polymerase",
            SignalMolecule => "signal-molecule",
            RegulatoryProtein => "regulatory-protein",
            Organelle => "organelle",
            Fluid => "fluid",
        }
    }
}

impl fmt::Display for BioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
