//! The built-in deployment table for the liquid staking protocol.

use alloy_core::primitives::U256;

use crate::{
    abi::Arg,
    error::Result,
    network::WFIL,
    unit::{Unit, UnitContext, WiringCall},
};

/// Admin fee of the staking controller, in basis points.
const ADMIN_FEE: u64 = 0;
/// Base profit share of the staking controller, in basis points.
const BASE_PROFIT_SHARE: u64 = 3000;
/// Liquidation threshold of the collateral contract, in basis points.
const COLLATERAL_THRESHOLD: u64 = 2725;

/// Resolver registrations followed by pool registration.
pub const INTEGRATION_CALLS: &[WiringCall] = &[
    WiringCall::new("Resolver", "setCollateralAddress", "StorageProviderCollateral"),
    WiringCall::new(
        "Resolver",
        "setLiquidStakingControllerAddress",
        "LiquidStakingController",
    ),
    WiringCall::new("Resolver", "setRegistryAddress", "StorageProviderRegistry"),
    WiringCall::new("Resolver", "setLiquidStakingAddress", "LiquidStaking"),
    WiringCall::new("Resolver", "setBeneficiaryManagerAddress", "BeneficiaryManager"),
    WiringCall::new("Resolver", "setRewardCollectorAddress", "RewardCollector"),
    WiringCall::new("StorageProviderRegistry", "registerPool", "LiquidStaking"),
];

/// Maximum allocation a storage provider may request, 10^24 attoFIL.
pub fn max_allocation() -> U256 {
    U256::from(10u64).pow(U256::from(24u64))
}

fn signer(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![ctx.signer().into()])
}

fn no_args(_: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(Vec::new())
}

fn registry_args(_: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![max_allocation().into()])
}

fn resolver(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![ctx.address_of("Resolver")?.into()])
}

fn wfil_and_resolver(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![
        ctx.known_address(WFIL)?.into(),
        ctx.address_of("Resolver")?.into(),
    ])
}

fn controller_args(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    Ok(vec![
        ADMIN_FEE.into(),
        BASE_PROFIT_SHARE.into(),
        ctx.address_of("RewardCollector")?.into(),
        ctx.address_of("Resolver")?.into(),
    ])
}

fn collateral_args(ctx: &UnitContext<'_>) -> Result<Vec<Arg>> {
    let mut args = wfil_and_resolver(ctx)?;
    args.push(COLLATERAL_THRESHOLD.into());
    Ok(args)
}

/// Every built-in unit, in declaration order.
pub fn all() -> Vec<Unit> {
    vec![
        Unit::plain("WFIL", "WFIL", signer)
            .tags(&["WFIL"])
            .local_only(),
        Unit::plain("Storage", "Storage", signer)
            .tags(&["Storage"])
            .local_only(),
        Unit::upgradeable("Resolver", "Resolver", no_args).tags(&["Resolver"]),
        Unit::plain(
            "StorageProviderRegistry",
            "StorageProviderRegistry",
            registry_args,
        )
        .tags(&["Registry"]),
        Unit::upgradeable("BeneficiaryManager", "BeneficiaryManager", resolver)
            .tags(&["BeneficiaryManager"])
            .depends_on(&["Resolver"]),
        Unit::upgradeable("RewardCollector", "RewardCollector", wfil_and_resolver)
            .tags(&["RewardCollector"])
            .depends_on(&["Resolver", "WFIL"])
            .requires(&[WFIL]),
        Unit::upgradeable(
            "LiquidStakingController",
            "LiquidStakingController",
            controller_args,
        )
        .tags(&["LiquidStakingController"])
        .depends_on(&["Resolver", "BeneficiaryManager", "WFIL", "RewardCollector"]),
        Unit::upgradeable(
            "StorageProviderCollateral",
            "StorageProviderCollateral",
            collateral_args,
        )
        .tags(&["StorageProviderCollateral", "Collateral"])
        .depends_on(&["Resolver", "WFIL"])
        .requires(&[WFIL]),
        Unit::upgradeable("LiquidStaking", "LiquidStaking", wfil_and_resolver)
            .tags(&["LiquidStaking", "Staking"])
            .depends_on(&["WFIL", "Resolver", "LiquidStakingController"])
            .requires(&[WFIL]),
        Unit::wiring("Integration", INTEGRATION_CALLS)
            .tags(&["Integration"])
            .depends_on(&[
                "StorageProviderCollateral",
                "LiquidStaking",
                "StorageProviderRegistry",
                "BeneficiaryManager",
                "RewardCollector",
                "LiquidStakingController",
                "Resolver",
            ]),
        Unit::upgrade("RewardCollectorV2", "RewardCollector", "RewardCollectorV2")
            .tags(&["RewardCollectorV2"])
            .depends_on(&["RewardCollector", "Integration"]),
    ]
}
