// Check-in: code generation, token issuance and redemption at the door.
//
// Per principal: NoToken -> Issued -> {Redeemed, Expired, Replaced} -> NoToken.

pub mod code;
pub mod redemption;
pub mod token;
