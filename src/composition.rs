/// Composition of Earth's atmosphere as exact molecule counts
/// Every quantity is an integer; fractions are numerators over FRACTION_DENOMINATOR

use crate::error::{Error, Result};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

/// Denominator every volume fraction is expressed over (10^21)
pub const FRACTION_DENOMINATOR: u128 = 1_000_000_000_000_000_000_000;

/// 22.4 L per mole, stored in tenths so it stays an integer
pub const MOLAR_VOLUME_TENTHS: u32 = 224;

/// Avogadro's constant, exact by definition
pub const AVOGADRO: u128 = 602_214_076_000_000_000_000_000;

/// Sum of all nine shares as written in the table, 1.00007971984.
/// The dry-air column does not add up to exactly 1 and is kept that way.
pub const TABLE_FRACTION_SUM: u128 = 1_000_079_719_840_000_000_000;

/// 108 * 10^10 km^3 of air, at 10^12 L per km^3
pub static ATMOSPHERIC_VOLUME_LITERS: Lazy<BigUint> =
    Lazy::new(|| BigUint::from(108u32) * BigUint::from(10u32).pow(22));

/// Share of wet air left for the dry constituents once water vapor takes 0.4%
const DRY_SCALE_PER_MILLE: u128 = 996;

/// Dry-air fraction in units of 10^-8, rescaled into wet air
const fn dry_share(hundred_millionths: u128) -> u128 {
    hundred_millionths * (FRACTION_DENOMINATOR / 100_000_000) * DRY_SCALE_PER_MILLE / 1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gas {
    Nitrogen,
    Oxygen,
    Argon,
    CarbonDioxide,
    Neon,
    Helium,
    Methane,
    Krypton,
    WaterVapor,
}

impl Gas {
    /// Fixed walk order for weighted draws
    pub const ALL: [Gas; 9] = [
        Gas::Nitrogen,
        Gas::Oxygen,
        Gas::Argon,
        Gas::CarbonDioxide,
        Gas::Neon,
        Gas::Helium,
        Gas::Methane,
        Gas::Krypton,
        Gas::WaterVapor,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Gas::Nitrogen => "Nitrogen",
            Gas::Oxygen => "Oxygen",
            Gas::Argon => "Argon",
            Gas::CarbonDioxide => "Carbon Dioxide",
            Gas::Neon => "Neon",
            Gas::Helium => "Helium",
            Gas::Methane => "Methane",
            Gas::Krypton => "Krypton",
            Gas::WaterVapor => "Water Vapor",
        }
    }

    /// Volume share of wet air, numerator over FRACTION_DENOMINATOR.
    /// Dry values from https://en.wikipedia.org/wiki/Atmosphere_of_Earth#Composition
    pub fn share(self) -> u128 {
        match self {
            Gas::Nitrogen => dry_share(78_084_000),
            Gas::Oxygen => dry_share(20_946_000),
            Gas::Argon => dry_share(934_000),
            Gas::CarbonDioxide => dry_share(41_361),
            Gas::Neon => dry_share(1_818),
            Gas::Helium => dry_share(524),
            Gas::Methane => dry_share(187),
            Gas::Krypton => dry_share(114),
            Gas::WaterVapor => 4 * FRACTION_DENOMINATOR / 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constituent {
    pub gas: Gas,
    pub share: u128,
    pub moles: BigUint,
    pub population: BigUint,
}

impl Constituent {
    pub fn display_name(&self) -> &'static str {
        self.gas.display_name()
    }

    /// Share as a float, for display only
    pub fn fraction(&self) -> f64 {
        self.share as f64 / FRACTION_DENOMINATOR as f64
    }
}

/// Immutable molecule counts for every constituent, in `Gas::ALL` order
#[derive(Debug, Clone)]
pub struct Composition {
    total_moles: BigUint,
    constituents: Vec<Constituent>,
}

impl Composition {
    /// The real atmosphere: 108 * 10^22 L of air at 22.4 L/mol
    pub fn earth() -> Result<Self> {
        let shares: Vec<(Gas, u128)> = Gas::ALL.iter().map(|&gas| (gas, gas.share())).collect();
        let composition = Self::from_parts(&ATMOSPHERIC_VOLUME_LITERS, MOLAR_VOLUME_TENTHS, &shares)?;
        info!(
            total_moles = %composition.total_moles,
            total_molecules = %composition.total_population(),
            "atmosphere composition ready"
        );
        Ok(composition)
    }

    pub fn from_parts(
        volume_liters: &BigUint,
        molar_volume_tenths: u32,
        shares: &[(Gas, u128)],
    ) -> Result<Self> {
        if volume_liters.is_zero() {
            return Err(Error::InvalidComposition("atmospheric volume is zero".into()));
        }
        if molar_volume_tenths == 0 {
            return Err(Error::InvalidComposition("molar volume is zero".into()));
        }
        if shares.is_empty() {
            return Err(Error::InvalidComposition("no constituents".into()));
        }

        // Scaled by ten so the single decimal digit of 22.4 survives
        let total_moles = BigUint::from(molar_volume_tenths) * volume_liters / 10u32;
        let denominator = BigUint::from(FRACTION_DENOMINATOR);
        let avogadro = BigUint::from(AVOGADRO);

        let mut constituents = Vec::with_capacity(shares.len());
        for &(gas, share) in shares {
            if share > FRACTION_DENOMINATOR {
                return Err(Error::InvalidComposition(format!(
                    "{} share {share} exceeds {FRACTION_DENOMINATOR}",
                    gas.display_name()
                )));
            }
            let moles = &total_moles * BigUint::from(share) / &denominator;
            let population = &avogadro * &moles;
            debug!(gas = gas.display_name(), %moles, %population, "constituent");
            constituents.push(Constituent { gas, share, moles, population });
        }

        let composition = Composition { total_moles, constituents };
        if composition.total_population().is_zero() {
            return Err(Error::InvalidComposition(
                "total population is zero, nothing can be drawn".into(),
            ));
        }
        Ok(composition)
    }

    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn get(&self, gas: Gas) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.gas == gas)
    }

    pub fn total_moles(&self) -> &BigUint {
        &self.total_moles
    }

    pub fn total_population(&self) -> BigUint {
        self.constituents.iter().map(|c| &c.population).sum()
    }

    /// Sum of the share numerators, over FRACTION_DENOMINATOR
    pub fn fraction_sum(&self) -> u128 {
        self.constituents.iter().map(|c| c.share).sum()
    }

    /// Order of magnitude of the largest population, for log lines
    pub fn largest_magnitude(&self) -> Option<u64> {
        self.constituents
            .iter()
            .map(|c| c.population.bits())
            .max()
            .and_then(|bits| (bits as f64 * std::f64::consts::LOG10_2).to_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(digits: &str) -> BigUint {
        digits.parse().unwrap()
    }

    #[test]
    fn test_shares_are_exact() {
        assert_eq!(Gas::Nitrogen.share(), 777_716_640_000_000_000_000);
        assert_eq!(Gas::CarbonDioxide.share(), 411_955_560_000_000_000);
        assert_eq!(Gas::Krypton.share(), 1_135_440_000_000_000);
        assert_eq!(Gas::WaterVapor.share(), 4_000_000_000_000_000_000);
    }

    #[test]
    fn test_fraction_sum_matches_table() {
        let composition = Composition::earth().unwrap();
        assert_eq!(composition.fraction_sum(), TABLE_FRACTION_SUM);
        assert_ne!(composition.fraction_sum(), FRACTION_DENOMINATOR);
    }

    #[test]
    fn test_total_moles() {
        let composition = Composition::earth().unwrap();
        assert_eq!(composition.total_moles(), &big("24192000000000000000000000"));
    }

    #[test]
    fn test_earth_populations_fixture() {
        let expected = [
            (Gas::Nitrogen, "11330369352225696890880000000000000000000000000000"),
            (Gas::Oxygen, "3039366790273544478720000000000000000000000000000"),
            (Gas::Argon, "135527956751431802880000000000000000000000000000"),
            (Gas::CarbonDioxide, "6001682889931446251520000000000000000000000000"),
            (Gas::Neon, "263800669565420789760000000000000000000000000"),
            (Gas::Helium, "76034956464400711680000000000000000000000000"),
            (Gas::Methane, "27134612326036131840000000000000000000000000"),
            (Gas::Krypton, "16541956177369620480000000000000000000000000"),
            (Gas::WaterVapor, "58275051706368000000000000000000000000000000000"),
        ];
        let composition = Composition::earth().unwrap();
        assert_eq!(composition.constituents().len(), expected.len());
        for (constituent, (gas, population)) in composition.constituents().iter().zip(expected) {
            assert_eq!(constituent.gas, gas);
            assert_eq!(constituent.population, big(population), "{}", gas.display_name());
        }
    }

    #[test]
    fn test_lookup_by_gas() {
        let composition = Composition::earth().unwrap();
        let water = composition.get(Gas::WaterVapor).unwrap();
        assert_eq!(water.display_name(), "Water Vapor");
        assert_eq!(water.moles, big("96768000000000000000000"));
        assert!((water.fraction() - 0.004).abs() < 1e-12);
        assert_eq!(composition.largest_magnitude(), Some(49));
    }

    #[test]
    fn test_population_is_avogadro_times_moles() {
        let composition = Composition::earth().unwrap();
        for c in composition.constituents() {
            let recomputed = BigUint::from(AVOGADRO)
                * (composition.total_moles() * BigUint::from(c.share)
                    / BigUint::from(FRACTION_DENOMINATOR));
            assert_eq!(c.population, recomputed);
        }
    }

    #[test]
    fn test_earth_is_reproducible() {
        let a = Composition::earth().unwrap();
        let b = Composition::earth().unwrap();
        assert_eq!(a.constituents(), b.constituents());
    }

    #[test]
    fn test_moles_truncate_toward_zero() {
        // 224 * 1 / 10 = 22 moles; 22 * 1/3 of the denominator truncates to 7
        let third = FRACTION_DENOMINATOR / 3;
        let composition =
            Composition::from_parts(&BigUint::from(1u32), 224, &[(Gas::Argon, third)]).unwrap();
        assert_eq!(composition.total_moles(), &BigUint::from(22u32));
        assert_eq!(composition.constituents()[0].moles, BigUint::from(7u32));
    }

    #[test]
    fn test_invalid_constants_fail_fast() {
        let volume = BigUint::from(1000u32);
        let shares = [(Gas::Nitrogen, FRACTION_DENOMINATOR)];
        assert!(matches!(
            Composition::from_parts(&BigUint::zero(), 224, &shares),
            Err(Error::InvalidComposition(_))
        ));
        assert!(matches!(
            Composition::from_parts(&volume, 0, &shares),
            Err(Error::InvalidComposition(_))
        ));
        assert!(matches!(
            Composition::from_parts(&volume, 224, &[]),
            Err(Error::InvalidComposition(_))
        ));
        assert!(matches!(
            Composition::from_parts(&volume, 224, &[(Gas::Neon, 0)]),
            Err(Error::InvalidComposition(_))
        ));
        assert!(matches!(
            Composition::from_parts(&volume, 224, &[(Gas::Neon, FRACTION_DENOMINATOR + 1)]),
            Err(Error::InvalidComposition(_))
        ));
    }

    #[test]
    fn test_display_names() {
        let names: Vec<_> = Gas::ALL.iter().map(|g| g.display_name()).collect();
        assert_eq!(
            names,
            [
                "Nitrogen",
                "Oxygen",
                "Argon",
                "Carbon Dioxide",
                "Neon",
                "Helium",
                "Methane",
                "Krypton",
                "Water Vapor"
            ]
        );
    }
}
