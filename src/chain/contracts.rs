//! Contract interfaces used by the keeper

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

sol! {
    /// Staking rewards contract, optionally chained to an external distributor
    interface IStakingRewards {
        function rewardsToken() external view returns (address);
        function stakingToken() external view returns (address);
        function rewardRate() external view returns (uint256);
        function periodFinish() external view returns (uint256);
        function externalStakingRewards() external view returns (address);
    }

    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
    }

    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }

    interface IFarmRegistry {
        event FarmInfo(address indexed stakingAddress, bytes32 indexed farmName, address indexed lpAddress);

        function updateFarmData(address stakingAddress, uint256 tvlUSD, uint256 rewardsUSDPerYear) external;
    }
}
