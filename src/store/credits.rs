use crate::error::Result;
use crate::models::{CreditBalance, CreditPackage, CreditTransaction, PageMeta};
use super::{Feedback, Store};

pub const TRANSACTION_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditsState {
    pub balance: i64,
    pub packages: Vec<CreditPackage>,
    pub transactions: Vec<CreditTransaction>,
    pub transactions_meta: Option<PageMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreditsAction {
    Pending,
    BalanceLoaded(i64),
    PackagesLoaded(Vec<CreditPackage>),
    TransactionsLoaded {
        transactions: Vec<CreditTransaction>,
        meta: Option<PageMeta>,
    },
    Rejected(String),
}

impl CreditsState {
    pub fn reduce(&mut self, action: CreditsAction) {
        match action {
            CreditsAction::Pending => {
                self.loading = true;
                self.error = None;
            }
            CreditsAction::BalanceLoaded(balance) => {
                self.loading = false;
                self.balance = balance;
            }
            CreditsAction::PackagesLoaded(packages) => {
                self.loading = false;
                self.packages = packages;
            }
            CreditsAction::TransactionsLoaded { transactions, meta } => {
                self.loading = false;
                self.transactions = transactions;
                self.transactions_meta = meta;
            }
            CreditsAction::Rejected(message) => {
                self.loading = false;
                self.error = Some(message);
            }
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.balance >= cost
    }
}

impl Store {
    pub async fn fetch_credit_balance(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("credits/balance".to_string()) else {
            return Ok(());
        };
        self.run(
            "credits/balance",
            Feedback::Read,
            |s| s.credits.reduce(CreditsAction::Pending),
            async { self.api().get_credit_balance().await?.into_data_or_default() },
            |s, balance: &CreditBalance| s.credits.reduce(CreditsAction::BalanceLoaded(balance.balance)),
            |s, message| s.credits.reduce(CreditsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn fetch_credit_packages(&self) -> Result<()> {
        let Some(_in_flight) = self.begin_request("credits/packages".to_string()) else {
            return Ok(());
        };
        self.run(
            "credits/packages",
            Feedback::Read,
            |s| s.credits.reduce(CreditsAction::Pending),
            async { self.api().get_credit_packages().await?.into_data_or_default() },
            |s, packages: &Vec<CreditPackage>| s.credits.reduce(CreditsAction::PackagesLoaded(packages.clone())),
            |s, message| s.credits.reduce(CreditsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }

    pub async fn fetch_credit_transactions(&self, page: u32) -> Result<()> {
        let Some(_in_flight) = self.begin_request(format!("credits/transactions/{}", page)) else {
            return Ok(());
        };
        self.run(
            "credits/transactions",
            Feedback::Read,
            |s| s.credits.reduce(CreditsAction::Pending),
            async {
                self.api()
                    .get_credit_transactions(page, TRANSACTION_PAGE_SIZE)
                    .await?
                    .into_page()
            },
            |s, (transactions, meta): &(Vec<CreditTransaction>, Option<PageMeta>)| {
                s.credits.reduce(CreditsAction::TransactionsLoaded {
                    transactions: transactions.clone(),
                    meta: *meta,
                })
            },
            |s, message| s.credits.reduce(CreditsAction::Rejected(message)),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_load_clears_loading() {
        let mut state = CreditsState::default();
        state.reduce(CreditsAction::Pending);
        state.reduce(CreditsAction::BalanceLoaded(42));
        assert!(!state.loading);
        assert!(state.can_afford(42));
        assert!(!state.can_afford(43));
    }
}
